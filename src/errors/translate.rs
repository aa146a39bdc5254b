//! Native → host error translation
//!
//! A pure classification table. The category is chosen by the error's kind,
//! never its message, and the message is carried over verbatim. Kinds missing
//! from the table fall back to a runtime error.

use std::collections::HashMap;

use tracing::debug;

use super::{BridgeError, HostError, HostErrorKind, NativeError, NativeErrorKind};

/// Maps each native error kind to exactly one host error category
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    table: HashMap<NativeErrorKind, HostErrorKind>,
    fallback: HostErrorKind,
}

impl ErrorTranslator {
    /// Empty table; everything translates to the fallback category
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            fallback: HostErrorKind::Runtime,
        }
    }

    /// Table with the three engine error kinds registered
    pub fn standard() -> Self {
        Self {
            table: HashMap::from([
                (NativeErrorKind::Graph, HostErrorKind::Runtime),
                (NativeErrorKind::Io, HostErrorKind::Io),
                (NativeErrorKind::Value, HostErrorKind::Value),
            ]),
            fallback: HostErrorKind::Runtime,
        }
    }

    pub fn register(
        &mut self,
        native: NativeErrorKind,
        host: HostErrorKind,
    ) -> Result<(), BridgeError> {
        if self.table.contains_key(&native) {
            return Err(BridgeError::DuplicateRegistration {
                type_name: format!("error translator for {native:?}"),
            });
        }
        debug!(target: "graft::errors", ?native, ?host, "registered error translator");
        self.table.insert(native, host);
        Ok(())
    }

    pub fn with_fallback(mut self, fallback: HostErrorKind) -> Self {
        self.fallback = fallback;
        self
    }

    /// Host category for a native error kind
    pub fn category(&self, kind: NativeErrorKind) -> HostErrorKind {
        self.table.get(&kind).copied().unwrap_or(self.fallback)
    }

    /// Translate and discard the native error
    pub fn translate(&self, err: NativeError) -> HostError {
        let kind = self.category(err.kind());
        debug!(
            target: "graft::errors",
            native = ?err.kind(),
            host = kind.host_name(),
            "translated native error"
        );
        HostError::new(kind, err.into_message())
    }

    /// Translate an arbitrary error by its static type
    pub fn translate_dyn(&self, err: &(dyn std::error::Error + 'static)) -> HostError {
        if let Some(native) = err.downcast_ref::<NativeError>() {
            self.translate(native.clone())
        } else if let Some(host) = err.downcast_ref::<HostError>() {
            host.clone()
        } else if let Some(bridge) = err.downcast_ref::<BridgeError>() {
            bridge.clone().into()
        } else if err.downcast_ref::<std::io::Error>().is_some() {
            HostError::new(self.category(NativeErrorKind::Io), err.to_string())
        } else {
            HostError::new(self.fallback, err.to_string())
        }
    }
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let translator = ErrorTranslator::standard();
        let cases = [
            (NativeError::graph("boom"), HostErrorKind::Runtime),
            (NativeError::io("boom"), HostErrorKind::Io),
            (NativeError::value("boom"), HostErrorKind::Value),
        ];
        for (native, expected) in cases {
            let host = translator.translate(native);
            assert_eq!(host.kind(), expected);
            assert_eq!(host.to_string(), "boom");
            assert_eq!(host.message(), "boom");
        }
    }

    #[test]
    fn test_unregistered_kind_uses_fallback() {
        let translator = ErrorTranslator::new();
        assert_eq!(
            translator.translate(NativeError::value("x")).kind(),
            HostErrorKind::Runtime
        );

        let translator = ErrorTranslator::new().with_fallback(HostErrorKind::Value);
        assert_eq!(
            translator.translate(NativeError::io("x")).kind(),
            HostErrorKind::Value
        );
    }

    #[test]
    fn test_duplicate_translator_rejected() {
        let mut translator = ErrorTranslator::standard();
        assert!(matches!(
            translator.register(NativeErrorKind::Io, HostErrorKind::Runtime),
            Err(BridgeError::DuplicateRegistration { .. })
        ));
        assert_eq!(translator.category(NativeErrorKind::Io), HostErrorKind::Io);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("foreign failure")]
    struct Foreign;

    #[test]
    fn test_translate_dyn() {
        let translator = ErrorTranslator::standard();

        let native = NativeError::value("bad");
        assert_eq!(translator.translate_dyn(&native).kind(), HostErrorKind::Value);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let host = translator.translate_dyn(&io);
        assert_eq!(host.kind(), HostErrorKind::Io);
        assert_eq!(host.message(), "disk");

        let host = translator.translate_dyn(&Foreign);
        assert_eq!(host.kind(), HostErrorKind::Runtime);
        assert_eq!(host.message(), "foreign failure");
    }
}
