//! Error types for the reactive runtime.

use thiserror::Error;

/// Errors surfaced by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The flush loop kept producing new work after the configured number of
    /// epochs. Some effect writes a signal that (transitively) re-triggers it.
    #[error("reactive update cycle did not settle after {epochs} flush epochs")]
    CyclicUpdate {
        /// The epoch cap that was exceeded.
        epochs: usize,
    },

    /// A panic escaped a user-supplied effect body or cleanup callback.
    ///
    /// This is never returned from the public API; it is built when the panic
    /// is caught and reported through `tracing`.
    #[error("effect created at {created_at} panicked: {message}")]
    EffectPanicked {
        /// Source location where the effect (or owner) was created.
        created_at: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The runtime configuration could not be parsed or is out of range.
    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl ReactiveError {
    /// Build an [`ReactiveError::EffectPanicked`] from a caught panic payload.
    pub(crate) fn from_panic(
        created_at: impl ToString,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };

        Self::EffectPanicked {
            created_at: created_at.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_extracted() {
        let err = ReactiveError::from_panic("src/app.rs:10:5", &"boom");
        assert_eq!(
            err.to_string(),
            "effect created at src/app.rs:10:5 panicked: boom"
        );

        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let err = ReactiveError::from_panic("here", owned.as_ref());
        assert!(matches!(err, ReactiveError::EffectPanicked { ref message, .. } if message == "owned"));

        let opaque: Box<dyn std::any::Any + Send> = Box::new(7u32);
        let err = ReactiveError::from_panic("here", opaque.as_ref());
        assert!(err.to_string().contains("non-string"));
    }

    #[test]
    fn cyclic_update_message() {
        let err = ReactiveError::CyclicUpdate { epochs: 100 };
        assert_eq!(
            err.to_string(),
            "reactive update cycle did not settle after 100 flush epochs"
        );
    }
}
