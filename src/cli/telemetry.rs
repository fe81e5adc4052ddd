use crate::cli::commands::logging::LogFormat;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize logging. `RUST_LOG` overrides the verbosity flag.
///
/// # Errors
///
/// Returns an error if a filter directive is invalid or a global subscriber is
/// already installed
pub fn init(verbosity_level: Option<Level>, format: LogFormat) -> Result<()> {
    let filter = env_filter(verbosity_level.unwrap_or(Level::ERROR))?;

    match format {
        LogFormat::Text => {
            let fmt_layer = fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(false);
            let subscriber = Registry::default().with(fmt_layer).with(filter);
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(false);
            let subscriber = Registry::default().with(fmt_layer).with(filter);
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

fn env_filter(default: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_to_requested_level() -> Result<()> {
        temp_env::with_var("RUST_LOG", None::<&str>, || {
            let filter = env_filter(Level::INFO)?;
            assert!(filter.to_string().contains("info"));
            Ok(())
        })
    }

    #[test]
    fn rust_log_overrides_level() -> Result<()> {
        temp_env::with_var("RUST_LOG", Some("custodian=trace"), || {
            let filter = env_filter(Level::ERROR)?;
            assert!(filter.to_string().contains("custodian=trace"));
            Ok(())
        })
    }
}
