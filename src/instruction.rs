use solana_program::{program_error::ProgramError, pubkey::Pubkey};

/// Instructions for the Percolator reward engine.
///
/// Wire format: one tag byte, then little-endian fields. `Option<Pubkey>` is
/// a flag byte followed by 32 bytes (zeroes when absent); `bool` is one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardInstruction {
    /// Bring one pool's accumulator up to the current time. Permissionless.
    UpdatePool { pool_id: u32 },

    /// Update every pool. Permissionless.
    MassUpdatePools,

    /// Stake `amount` from the signer into `to`'s position.
    /// Pending reward of `to` is paid out first.
    Deposit { pool_id: u32, amount: u64, to: Pubkey },

    /// Unstake `amount` from the signer's position; principal and pending go to `to`.
    Withdraw { pool_id: u32, amount: u64, to: Pubkey },

    /// Pay the signer's pending reward to `to`.
    Harvest { pool_id: u32, to: Pubkey },

    /// Withdraw and harvest in one rebase.
    WithdrawAndHarvest { pool_id: u32, amount: u64, to: Pubkey },

    /// Return principal to `to`, forfeiting pending reward.
    EmergencyWithdraw { pool_id: u32, to: Pubkey },

    /// Admin registers a pool.
    AddPool {
        staked_asset: Pubkey,
        alloc_weight: u64,
        rewarder: Option<Pubkey>,
    },

    /// Admin edits a pool's weight, and its rewarder only if `overwrite_rewarder`.
    SetPool {
        pool_id: u32,
        alloc_weight: u64,
        rewarder: Option<Pubkey>,
        overwrite_rewarder: bool,
    },

    /// Admin changes the global emission rate.
    SetEmissionRate { rate: u64 },

    /// Admin changes the staker / operator A / operator B split.
    SetSplits {
        split_staker: u64,
        split_op_a: u64,
        split_op_b: u64,
    },

    /// Admin replaces the operator recipients.
    SetOperators { op_a: Pubkey, op_b: Pubkey },

    /// Admin changes a secondary reward token's rate on a pool's rewarder.
    SetRewarderRate {
        pool_id: u32,
        reward_token: Pubkey,
        rate: u64,
    },
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProgramError> {
        if self.data.len() < n {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, ProgramError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ProgramError> {
        let bytes = self.take(4)?.try_into().map_err(|_| ProgramError::InvalidInstructionData)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> Result<u64, ProgramError> {
        let bytes = self.take(8)?.try_into().map_err(|_| ProgramError::InvalidInstructionData)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn pubkey(&mut self) -> Result<Pubkey, ProgramError> {
        Pubkey::try_from(self.take(32)?).map_err(|_| ProgramError::InvalidInstructionData)
    }

    fn option_pubkey(&mut self) -> Result<Option<Pubkey>, ProgramError> {
        let present = self.u8()? != 0;
        let key = self.pubkey()?;
        Ok(present.then_some(key))
    }
}

fn put_option_pubkey(data: &mut Vec<u8>, key: &Option<Pubkey>) {
    match key {
        Some(k) => {
            data.push(1);
            data.extend_from_slice(k.as_ref());
        }
        None => {
            data.push(0);
            data.extend_from_slice(&[0u8; 32]);
        }
    }
}

impl RewardInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;
        let mut r = Reader { data: rest };

        match tag {
            0 => Ok(Self::UpdatePool { pool_id: r.u32()? }),
            1 => Ok(Self::MassUpdatePools),
            2 => Ok(Self::Deposit { pool_id: r.u32()?, amount: r.u64()?, to: r.pubkey()? }),
            3 => Ok(Self::Withdraw { pool_id: r.u32()?, amount: r.u64()?, to: r.pubkey()? }),
            4 => Ok(Self::Harvest { pool_id: r.u32()?, to: r.pubkey()? }),
            5 => Ok(Self::WithdrawAndHarvest { pool_id: r.u32()?, amount: r.u64()?, to: r.pubkey()? }),
            6 => Ok(Self::EmergencyWithdraw { pool_id: r.u32()?, to: r.pubkey()? }),
            7 => Ok(Self::AddPool {
                staked_asset: r.pubkey()?,
                alloc_weight: r.u64()?,
                rewarder: r.option_pubkey()?,
            }),
            8 => Ok(Self::SetPool {
                pool_id: r.u32()?,
                alloc_weight: r.u64()?,
                rewarder: r.option_pubkey()?,
                overwrite_rewarder: r.u8()? != 0,
            }),
            9 => Ok(Self::SetEmissionRate { rate: r.u64()? }),
            10 => Ok(Self::SetSplits {
                split_staker: r.u64()?,
                split_op_a: r.u64()?,
                split_op_b: r.u64()?,
            }),
            11 => Ok(Self::SetOperators { op_a: r.pubkey()?, op_b: r.pubkey()? }),
            12 => Ok(Self::SetRewarderRate {
                pool_id: r.u32()?,
                reward_token: r.pubkey()?,
                rate: r.u64()?,
            }),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + 32 + 32 + 8 + 8);
        match self {
            Self::UpdatePool { pool_id } => {
                data.push(0);
                data.extend_from_slice(&pool_id.to_le_bytes());
            }
            Self::MassUpdatePools => data.push(1),
            Self::Deposit { pool_id, amount, to } => {
                data.push(2);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
                data.extend_from_slice(to.as_ref());
            }
            Self::Withdraw { pool_id, amount, to } => {
                data.push(3);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
                data.extend_from_slice(to.as_ref());
            }
            Self::Harvest { pool_id, to } => {
                data.push(4);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(to.as_ref());
            }
            Self::WithdrawAndHarvest { pool_id, amount, to } => {
                data.push(5);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
                data.extend_from_slice(to.as_ref());
            }
            Self::EmergencyWithdraw { pool_id, to } => {
                data.push(6);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(to.as_ref());
            }
            Self::AddPool { staked_asset, alloc_weight, rewarder } => {
                data.push(7);
                data.extend_from_slice(staked_asset.as_ref());
                data.extend_from_slice(&alloc_weight.to_le_bytes());
                put_option_pubkey(&mut data, rewarder);
            }
            Self::SetPool { pool_id, alloc_weight, rewarder, overwrite_rewarder } => {
                data.push(8);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(&alloc_weight.to_le_bytes());
                put_option_pubkey(&mut data, rewarder);
                data.push(u8::from(*overwrite_rewarder));
            }
            Self::SetEmissionRate { rate } => {
                data.push(9);
                data.extend_from_slice(&rate.to_le_bytes());
            }
            Self::SetSplits { split_staker, split_op_a, split_op_b } => {
                data.push(10);
                data.extend_from_slice(&split_staker.to_le_bytes());
                data.extend_from_slice(&split_op_a.to_le_bytes());
                data.extend_from_slice(&split_op_b.to_le_bytes());
            }
            Self::SetOperators { op_a, op_b } => {
                data.push(11);
                data.extend_from_slice(op_a.as_ref());
                data.extend_from_slice(op_b.as_ref());
            }
            Self::SetRewarderRate { pool_id, reward_token, rate } => {
                data.push(12);
                data.extend_from_slice(&pool_id.to_le_bytes());
                data.extend_from_slice(reward_token.as_ref());
                data.extend_from_slice(&rate.to_le_bytes());
            }
        }
        data
    }

    /// Instructions only the engine admin may submit.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::AddPool { .. }
                | Self::SetPool { .. }
                | Self::SetEmissionRate { .. }
                | Self::SetSplits { .. }
                | Self::SetOperators { .. }
                | Self::SetRewarderRate { .. }
        )
    }
}
