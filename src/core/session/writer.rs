//! Payload validation and write sequencing.

use crate::error::SessionError;

/// A validated payload, encoded and ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPayload {
    bytes: Vec<u8>,
}

impl OutgoingPayload {
    /// Encodes user text as UTF-8. Empty input is rejected here, before the
    /// adapter is ever contacted.
    pub fn encode(text: &str) -> Result<Self, SessionError> {
        if text.is_empty() {
            return Err(SessionError::InvalidPayload);
        }
        Ok(Self {
            bytes: text.as_bytes().to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Enforces the one-write-in-flight rule for the active session.
#[derive(Debug, Default)]
pub struct WriteCoordinator {
    in_flight: bool,
}

impl WriteCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the write slot. Fails while a previous write is still pending.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::WriteInProgress);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Releases the slot once the adapter acknowledged or rejected the write,
    /// or when the link goes away mid-write.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(
            OutgoingPayload::encode("").unwrap_err(),
            SessionError::InvalidPayload
        );
    }

    #[test]
    fn payload_encodes_as_utf8() {
        let payload = OutgoingPayload::encode("123").unwrap();
        assert_eq!(payload.as_bytes(), b"123");
    }

    #[test]
    fn second_begin_fails_until_finished() {
        let mut writer = WriteCoordinator::new();
        writer.begin().unwrap();
        assert_eq!(writer.begin().unwrap_err(), SessionError::WriteInProgress);
        writer.finish();
        assert!(writer.begin().is_ok());
    }
}
