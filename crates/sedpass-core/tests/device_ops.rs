//! State machine behavior against a scripted channel.

use std::collections::VecDeque;

use secrecy::SecretString;
use sedpass_core::handy_store;
use sedpass_core::{
    CipherAlgorithm, RawChannel, SedDevice, SedError, SecurityStatus, TransportError,
    UnlockOutcome, BLOCK_SIZE, CDB_LEN,
};

/// Scripted channel: queued status responses, a fixed handy-store page, and
/// a log of every write command that reached the "device".
#[derive(Default)]
struct ScriptedChannel {
    status_responses: VecDeque<Vec<u8>>,
    handy_store: Option<Vec<u8>>,
    writes: Vec<([u8; CDB_LEN], Vec<u8>)>,
    fail_writes: bool,
}

impl ScriptedChannel {
    fn push_status(&mut self, security_status: u8, cipher: u8, token: [u8; 4]) {
        let mut data = vec![0u8; BLOCK_SIZE];
        data[0] = 0x45;
        data[3] = security_status;
        data[4] = cipher;
        data[8..12].copy_from_slice(&token);
        self.status_responses.push_back(data);
    }

    fn set_handy_store(&mut self, iteration: u32, salt: &[u8]) {
        let mut data = vec![0u8; BLOCK_SIZE];
        data[..4].copy_from_slice(&[0x00, 0x01, 0x44, 0x57]);
        data[8..12].copy_from_slice(&iteration.to_le_bytes());
        data[12..12 + salt.len()].copy_from_slice(salt);
        data[511] = handy_store::checksum(&data);
        self.handy_store = Some(data);
    }
}

impl RawChannel for ScriptedChannel {
    fn execute(
        &mut self,
        cdb: &[u8; CDB_LEN],
        data_out: Option<&[u8]>,
        data_in_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        match cdb[0] {
            0xC0 => {
                assert_eq!(data_in_len, BLOCK_SIZE);
                self.status_responses
                    .pop_front()
                    .ok_or_else(|| TransportError("unscripted status query".into()))
            }
            0xD8 => self
                .handy_store
                .clone()
                .ok_or_else(|| TransportError("unscripted handy store read".into())),
            0xC1 => {
                self.writes
                    .push((*cdb, data_out.unwrap_or_default().to_vec()));
                if self.fail_writes {
                    Err(TransportError("device rejected the write".into()))
                } else {
                    Ok(Vec::new())
                }
            }
            other => panic!("unexpected opcode {other:#04x}"),
        }
    }
}

const SALT_AB: [u8; 8] = [0x41, 0x00, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00];

fn pw(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

// ── Unlock gating ─────────────────────────────────────────────────────────────

#[test]
fn unlock_from_locked_sends_one_command() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);

    let mut device = SedDevice::new(channel);
    let outcome = device.unlock(&pw("hunter2")).unwrap();
    assert_eq!(outcome, UnlockOutcome::Unlocked);

    let channel = device.into_inner();
    assert_eq!(channel.writes.len(), 1);
    let (cdb, payload) = &channel.writes[0];
    assert_eq!(&cdb[..2], &[0xC1, 0xE1]);
    assert_eq!(cdb[8], 8 + 16); // AES-128-CBC → 16-byte block
    assert_eq!(payload.len(), 8 + 16);
    assert_eq!(&payload[6..8], &[0x00, 0x10]);
}

#[test]
fn unlock_when_already_unlocked_is_a_no_op() {
    for raw_status in [0x00u8, 0x02] {
        let mut channel = ScriptedChannel::default();
        channel.push_status(raw_status, 0x12, [0; 4]);

        let mut device = SedDevice::new(channel);
        let outcome = device.unlock(&pw("irrelevant")).unwrap();
        assert_eq!(outcome, UnlockOutcome::AlreadyUnlocked);
        assert!(device.into_inner().writes.is_empty());
    }
}

#[test]
fn unlock_from_blocked_states_is_invalid() {
    for raw_status in [0x06u8, 0x07] {
        let mut channel = ScriptedChannel::default();
        channel.push_status(raw_status, 0x12, [0; 4]);

        let mut device = SedDevice::new(channel);
        let err = device.unlock(&pw("irrelevant")).unwrap_err();
        assert!(matches!(err, SedError::InvalidState(_)));
        assert!(device.into_inner().writes.is_empty());
    }
}

#[test]
fn unlock_with_unknown_cipher_is_unsupported() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x77, [0; 4]);

    let mut device = SedDevice::new(channel);
    assert!(matches!(
        device.unlock(&pw("x")),
        Err(SedError::UnsupportedCipher(0x77))
    ));
}

#[test]
fn rejected_unlock_surfaces_as_operation_failed() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);
    channel.fail_writes = true;

    let mut device = SedDevice::new(channel);
    assert!(matches!(
        device.unlock(&pw("wrong")),
        Err(SedError::OperationFailed(_))
    ));
}

#[test]
fn unlock_with_saved_block_skips_the_handy_store() {
    // Derive once through a device with a handy store...
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);
    let mut device = SedDevice::new(channel);
    let block = device.derive_password(&pw("hunter2")).unwrap();
    drop(device);

    // ...then unlock a device that has no handy store scripted at all.
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [0; 4]);
    let mut device = SedDevice::new(channel);
    assert_eq!(
        device.unlock_with_block(&block).unwrap(),
        UnlockOutcome::Unlocked
    );
    let channel = device.into_inner();
    assert_eq!(channel.writes.len(), 1);
    assert_eq!(&channel.writes[0].1[8..], block.transmitted(16));
}

// ── End-to-end decode + derivation stability ──────────────────────────────────

#[test]
fn locked_aes128_cbc_decodes_and_derives_stably() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [9, 9, 9, 9]);
    channel.set_handy_store(1000, &SALT_AB);

    let mut device = SedDevice::new(channel);
    let status = device.encryption_status().unwrap();
    assert_eq!(status.security_status, SecurityStatus::Locked);
    assert_eq!(status.cipher, CipherAlgorithm::Aes128Cbc);
    assert_eq!(status.cipher.password_block_len().unwrap(), 16);

    let a = device.derive_password(&pw("mock-passphrase")).unwrap();
    let b = device.derive_password(&pw("mock-passphrase")).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
}

// ── Change password ───────────────────────────────────────────────────────────

fn change_password_flags(old: &str, new: &str) -> u8 {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x02, 0x22, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);

    let mut device = SedDevice::new(channel);
    device.change_password(&pw(old), &pw(new)).unwrap();
    let channel = device.into_inner();
    assert_eq!(channel.writes.len(), 1);
    channel.writes[0].1[3]
}

#[test]
fn change_password_flag_matrix() {
    assert_eq!(change_password_flags("", "new"), 0x01);
    assert_eq!(change_password_flags("old", ""), 0x10);
    // both sides present: 0x11 cleared back to 0x00
    assert_eq!(change_password_flags("old", "new"), 0x00);
}

#[test]
fn change_password_both_empty_is_invalid_before_any_command() {
    let mut device = SedDevice::new(ScriptedChannel::default());
    assert!(matches!(
        device.change_password(&pw(""), &pw("")),
        Err(SedError::InvalidArgument(_))
    ));
    assert!(device.into_inner().writes.is_empty());
}

#[test]
fn change_password_requires_unlocked_or_no_lock() {
    for raw_status in [0x01u8, 0x06, 0x07] {
        let mut channel = ScriptedChannel::default();
        channel.push_status(raw_status, 0x22, [0; 4]);

        let mut device = SedDevice::new(channel);
        assert!(matches!(
            device.change_password(&pw("old"), &pw("new")),
            Err(SedError::InvalidState(_))
        ));
        assert!(device.into_inner().writes.is_empty());
    }
}

#[test]
fn empty_side_transmits_pwblen_zero_bytes() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x00, 0x12, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);

    let mut device = SedDevice::new(channel);
    device.change_password(&pw(""), &pw("enable-me")).unwrap();
    let channel = device.into_inner();
    let (cdb, payload) = &channel.writes[0];
    assert_eq!(cdb[8], 8 + 2 * 16);
    assert_eq!(payload.len(), 8 + 2 * 16);
    assert_eq!(&payload[8..24], &[0u8; 16]); // old side: pwblen zeros
    assert_ne!(&payload[24..40], &[0u8; 16]); // new side: derived block
}

// ── Secure erase ──────────────────────────────────────────────────────────────

#[test]
fn secure_erase_uses_the_token_from_the_freshest_read() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x02, 0x22, [1, 1, 1, 1]); // cipher discovery read
    channel.push_status(0x02, 0x22, [2, 2, 2, 2]); // token read, immediately before encode
    let mut device = SedDevice::new(channel);
    device.secure_erase(None).unwrap();

    let channel = device.into_inner();
    assert_eq!(channel.writes.len(), 1);
    let (cdb, payload) = &channel.writes[0];
    assert_eq!(&cdb[..2], &[0xC1, 0xE3]);
    assert_eq!(&cdb[2..6], &[2, 2, 2, 2], "stale token must never be used");
    assert_eq!(cdb[8], 8 + 32);
    assert_eq!(payload[3], 0x01);
    assert_eq!(payload[4], 0x30);
    assert_eq!(payload.len(), 8 + 32);
}

#[test]
fn secure_erase_fde_leaves_flags_clear() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x02, 0x30, [0; 4]);
    channel.push_status(0x02, 0x30, [0; 4]);
    let mut device = SedDevice::new(channel);
    device.secure_erase(None).unwrap();
    assert_eq!(device.into_inner().writes[0].1[3], 0x00);
}

#[test]
fn secure_erase_cipher_override() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x02, 0x22, [0; 4]);
    channel.push_status(0x02, 0x22, [0; 4]);
    let mut device = SedDevice::new(channel);
    device
        .secure_erase(Some(CipherAlgorithm::Aes128Ecb))
        .unwrap();
    let channel = device.into_inner();
    assert_eq!(channel.writes[0].0[8], 8 + 16);
}

#[test]
fn secure_erase_random_material_differs_between_invocations() {
    let payload_of = || {
        let mut channel = ScriptedChannel::default();
        channel.push_status(0x02, 0x22, [0; 4]);
        channel.push_status(0x02, 0x22, [0; 4]);
        let mut device = SedDevice::new(channel);
        device.secure_erase(None).unwrap();
        device.into_inner().writes[0].1[8..].to_vec()
    };
    assert_ne!(payload_of(), payload_of());
}

// ── Mount precondition ────────────────────────────────────────────────────────

#[test]
fn mount_precondition_gating() {
    for raw_status in [0x00u8, 0x02] {
        let mut channel = ScriptedChannel::default();
        channel.push_status(raw_status, 0x12, [0; 4]);
        assert!(SedDevice::new(channel).ensure_mountable().is_ok());
    }
    for raw_status in [0x01u8, 0x06, 0x07] {
        let mut channel = ScriptedChannel::default();
        channel.push_status(raw_status, 0x12, [0; 4]);
        assert!(matches!(
            SedDevice::new(channel).ensure_mountable(),
            Err(SedError::InvalidState(_))
        ));
    }
}

// ── Protocol errors ───────────────────────────────────────────────────────────

#[test]
fn corrupt_handy_store_never_reaches_derivation() {
    let mut channel = ScriptedChannel::default();
    channel.push_status(0x01, 0x12, [0; 4]);
    channel.set_handy_store(1000, &SALT_AB);
    if let Some(block) = channel.handy_store.as_mut() {
        block[12] ^= 0xFF; // corrupt the salt, checksum now wrong
    }

    let mut device = SedDevice::new(channel);
    let err = device.unlock(&pw("hunter2")).unwrap_err();
    assert!(matches!(
        err,
        SedError::Protocol(sedpass_core::ProtocolError::BadChecksum { .. })
    ));
    assert!(device.into_inner().writes.is_empty());
}

#[test]
fn status_with_wrong_signature_is_a_protocol_error() {
    let mut channel = ScriptedChannel::default();
    let mut data = vec![0u8; BLOCK_SIZE];
    data[0] = 0x00;
    channel.status_responses.push_back(data);

    let mut device = SedDevice::new(channel);
    assert!(matches!(
        device.encryption_status(),
        Err(SedError::Protocol(
            sedpass_core::ProtocolError::UnexpectedSignature(0x00)
        ))
    ));
}
