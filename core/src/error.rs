// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Error-type for pox-core.

use thiserror::Error;

/// The pox-core error type.
///
/// Every failure of a stacking, delegation or authorization operation is
/// reported with one of these variants. [`Error::code`] maps them back to the
/// integer codes used by the PoX-4 contract interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The lock amount exceeds the spendable balance.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// The lock period is outside of the allowed range.
    #[error("invalid lock period")]
    InvalidLockPeriod,
    /// The principal already has an active stacking entry.
    #[error("already stacked")]
    AlreadyStacked,
    /// The principal is unknown, or there is nothing stacked for it.
    #[error("no such principal")]
    NoSuchPrincipal,
    /// The caller is not allowed to act on behalf of the stacker.
    #[error("permission denied")]
    PermissionDenied,
    /// The amount is below the current stacking minimum.
    #[error("stacking threshold not met")]
    ThresholdNotMet,
    /// The pox address is malformed.
    #[error("invalid pox address")]
    InvalidPoxAddress,
    /// The amount is zero.
    #[error("invalid amount")]
    InvalidAmount,
    /// The operation is not allowed for the caller.
    #[error("not allowed")]
    NotAllowed,
    /// The principal already has an active delegation.
    #[error("already delegated")]
    AlreadyDelegated,
    /// The delegation would expire before the lock ends.
    #[error("delegation expires during lock")]
    DelegationExpiresDuringLock,
    /// The amount exceeds what was delegated.
    #[error("delegation too much locked")]
    DelegationTooMuchLocked,
    /// The delegation requires a different pox address.
    #[error("delegation pox address required")]
    DelegationPoxAddrRequired,
    /// The start burn height maps to a reward cycle in the past.
    #[error("invalid start burn height")]
    InvalidStartBurnHeight,
    /// The caller has no stacking entry.
    #[error("not current stacker")]
    NotCurrentStacker,
    /// The stacking entry to extend is no longer locked.
    #[error("stack extend not locked")]
    StackExtendNotLocked,
    /// The stacking entry to increase is no longer locked.
    #[error("stack increase not locked")]
    StackIncreaseNotLocked,
    /// The reward set has no slot at the given index.
    #[error("delegation no reward slot")]
    DelegationNoRewardSlot,
    /// The reward slot belongs to a different pox address or stacker.
    #[error("delegation wrong reward slot")]
    DelegationWrongRewardSlot,
    /// The entry was stacked through a delegate.
    #[error("stacking is delegated")]
    StackingIsDelegated,
    /// The entry was stacked directly, not through a delegate.
    #[error("stacking not delegated")]
    StackingNotDelegated,
    /// The principal has no active delegation.
    #[error("not delegated")]
    NotDelegated,
    /// The signer key is not a valid compressed secp256k1 key.
    #[error("invalid signer key")]
    InvalidSignerKey,
    /// The signer key is bound to a different principal.
    #[error("reused signer key")]
    ReusedSignerKey,
    /// The delegation was already revoked.
    #[error("delegation already revoked")]
    DelegationAlreadyRevoked,
    /// The signature was not produced by the signer key.
    #[error("invalid signature pubkey")]
    InvalidSignaturePubkey,
    /// No public key can be recovered from the signature.
    #[error("invalid signature recover")]
    InvalidSignatureRecover,
    /// The authorization targets a different reward cycle.
    #[error("invalid reward cycle")]
    InvalidRewardCycle,
    /// The requested amount exceeds the authorized maximum.
    #[error("signer authorization amount too high")]
    SignerAuthAmountTooHigh,
    /// The authorization was already consumed.
    #[error("signer authorization used")]
    SignerAuthUsed,
    /// The authorization was issued for a different topic.
    #[error("wrong signer topic")]
    WrongSignerTopic,
    /// The authorization was issued for a different period or pox address.
    #[error("signer authorization mismatch")]
    SignerAuthMismatch,
    /// The burn height precedes the first burnchain block.
    #[error("invalid burn height")]
    InvalidHeight,
    /// The protocol constants are inconsistent.
    #[error("invalid pox constants")]
    InvalidConstants,
    /// Dusk-bytes `InvalidData` error
    #[error("invalid data")]
    InvalidData,
    /// Dusk-bytes `BadLength` error
    #[error("bad length: found {0}, expected {1}")]
    BadLength(usize, usize),
}

impl Error {
    /// The PoX-4 integer code of the error.
    ///
    /// Variants without a dedicated contract code report the code of the
    /// contract check they refine.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::InsufficientFunds => 1,
            Self::InvalidLockPeriod => 2,
            Self::AlreadyStacked => 3,
            Self::NoSuchPrincipal => 4,
            Self::PermissionDenied => 9,
            Self::ThresholdNotMet => 11,
            Self::InvalidPoxAddress => 13,
            Self::InvalidAmount => 18,
            Self::NotAllowed => 19,
            Self::AlreadyDelegated => 20,
            Self::DelegationExpiresDuringLock => 21,
            Self::DelegationTooMuchLocked => 22,
            Self::DelegationPoxAddrRequired => 23,
            Self::InvalidStartBurnHeight | Self::InvalidHeight => 24,
            Self::NotCurrentStacker => 25,
            Self::StackExtendNotLocked => 26,
            Self::StackIncreaseNotLocked => 27,
            Self::DelegationNoRewardSlot => 28,
            Self::DelegationWrongRewardSlot => 29,
            Self::StackingIsDelegated => 30,
            Self::StackingNotDelegated | Self::NotDelegated => 31,
            Self::InvalidSignerKey => 32,
            Self::ReusedSignerKey => 33,
            Self::DelegationAlreadyRevoked => 34,
            Self::InvalidSignaturePubkey
            | Self::WrongSignerTopic
            | Self::SignerAuthMismatch => 35,
            Self::InvalidSignatureRecover => 36,
            Self::InvalidRewardCycle => 37,
            Self::SignerAuthAmountTooHigh => 38,
            Self::SignerAuthUsed => 39,
            Self::InvalidConstants
            | Self::InvalidData
            | Self::BadLength(..) => 254,
        }
    }

    /// Whether the error stems from caller input that can be corrected and
    /// resubmitted, as opposed to a conflict with existing state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyStacked
                | Self::AlreadyDelegated
                | Self::NotCurrentStacker
                | Self::StackExtendNotLocked
                | Self::StackIncreaseNotLocked
                | Self::StackingIsDelegated
                | Self::StackingNotDelegated
                | Self::NotDelegated
                | Self::DelegationAlreadyRevoked
                | Self::ReusedSignerKey
                | Self::SignerAuthUsed
                | Self::PermissionDenied
        )
    }
}

impl From<dusk_bytes::Error> for Error {
    fn from(bytes_error: dusk_bytes::Error) -> Self {
        match bytes_error {
            dusk_bytes::Error::InvalidData => Self::InvalidData,
            dusk_bytes::Error::BadLength { found, expected } => {
                Self::BadLength(found, expected)
            }
            dusk_bytes::Error::InvalidChar { .. } => Self::InvalidData,
        }
    }
}
