use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RewardError {
    /// Pool id is not registered
    UnknownPool = 0,
    /// Staked asset already backs another pool
    DuplicateStakedAsset = 1,
    /// Asset is not a transferable asset in the ledger (or is the reward asset)
    InvalidAsset = 2,
    /// Rewarder is unknown, bound to another engine, or bound to another asset
    InvalidRewarder = 3,
    /// Withdrawal exceeds the staked amount
    InsufficientStake = 4,
    /// No position exists for this (pool, user)
    PositionNotFound = 5,
    /// Splits do not sum to the denominator
    InvalidSplit = 6,
    /// An individual split exceeds its ceiling
    SplitCeilingExceeded = 7,
    /// Asset ledger refused a transfer
    TransferFailed = 8,
    /// Arithmetic overflow
    Overflow = 9,
    /// Supplied time is earlier than the last recorded accrual
    TimeRegression = 10,
    /// Caller is not allowed to perform this operation
    Unauthorized = 11,
    /// Rewarder lock is poisoned
    RewarderUnavailable = 12,
    /// Reward token is not configured on the rewarder
    UnknownRewardToken = 13,
    /// Reward token already configured on the rewarder
    DuplicateRewardToken = 14,
    /// Decimal gap between staked and reward asset is too large
    InvalidPrecision = 15,
    /// Shared engine lock is poisoned
    EngineUnavailable = 16,
}

/// Coarse classification used by callers deciding whether a retry can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvariantViolation,
    PolicyViolation,
    TransferFailure,
    ArithmeticOverflow,
    Authorization,
    Configuration,
}

impl RewardError {
    pub fn class(self) -> ErrorClass {
        match self {
            RewardError::UnknownPool
            | RewardError::DuplicateStakedAsset
            | RewardError::InsufficientStake
            | RewardError::PositionNotFound
            | RewardError::TimeRegression
            | RewardError::UnknownRewardToken
            | RewardError::DuplicateRewardToken => ErrorClass::InvariantViolation,
            RewardError::InvalidSplit | RewardError::SplitCeilingExceeded => {
                ErrorClass::PolicyViolation
            }
            RewardError::TransferFailed => ErrorClass::TransferFailure,
            RewardError::Overflow => ErrorClass::ArithmeticOverflow,
            RewardError::Unauthorized => ErrorClass::Authorization,
            RewardError::InvalidAsset
            | RewardError::InvalidRewarder
            | RewardError::RewarderUnavailable
            | RewardError::InvalidPrecision
            | RewardError::EngineUnavailable => ErrorClass::Configuration,
        }
    }
}

impl From<RewardError> for ProgramError {
    fn from(e: RewardError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
