//! Declarative macros shared across the agent

/// Define a metric label enum with `name()` and `all()`
///
/// # Example
/// ```
/// use switchtec::metric_enum;
///
/// metric_enum! {
///     pub enum LinkMetric {
///         Up => "up",
///         Down => "down",
///     }
/// }
///
/// assert_eq!(LinkMetric::Down.name(), "down");
/// assert_eq!(LinkMetric::all().len(), 2);
/// ```
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}

/// Gather metrics from an exporter's registry into `buffer`
///
/// # Example
/// ```ignore
/// let mut buffer = Vec::new();
/// gather_metrics!(buffer, encoder, state.exporter, "device");
/// ```
#[macro_export]
macro_rules! gather_metrics {
    ($buffer:expr, $encoder:expr, $exporter:expr, $name:literal) => {
        if let Some(ref exporter) = $exporter {
            let metric_families = exporter.registry().gather();
            if let Err(e) = $encoder.encode(&metric_families, &mut $buffer) {
                tracing::error!(concat!("Failed to encode ", $name, " metrics: {}"), e);
            }
        }
    };
}
