// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of a single flow invocation.
//!
//! One tagged value replaces the loose `loading` / `pending` / `waiting`
//! flags a UI would otherwise juggle. [`FlowState::on`] is the only way to
//! move between states and refuses any transition not listed below:
//!
//! | From                                 | Event          | To                          |
//! |--------------------------------------|----------------|-----------------------------|
//! | `Idle`, `Succeeded`, `Failed`        | `Begin`        | `Submitting`                |
//! | `Submitting`                         | `Sent(tx)`     | `AwaitingReceipt{tx}`       |
//! | `AwaitingReceipt`                    | `Mined`        | `ExtractingResult{tx, 0}`   |
//! | `ExtractingResult`                   | `Missed`       | `ExtractingResult{tx, n+1}` |
//! | `AwaitingReceipt`, `ExtractingResult`| `Completed(v)` | `Succeeded(v)`              |
//! | any non-terminal                     | `Fail(e)`      | `Failed(e)`                 |
//! | `Succeeded`, `Failed`                | `Reset`        | `Idle`                      |

use alloy::primitives::TxHash;

use crate::{Error, FlowError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState<T> {
    Idle,
    Submitting,
    AwaitingReceipt {
        tx_hash: TxHash,
    },
    ExtractingResult {
        tx_hash: TxHash,
        /// Extraction attempts that came back empty so far
        attempts: u32,
    },
    Succeeded(T),
    Failed(FlowError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent<T> {
    Begin,
    Sent(TxHash),
    Mined,
    Missed,
    Completed(T),
    Fail(FlowError),
    Reset,
}

impl<T> FlowEvent<T> {
    pub fn label(&self) -> &'static str {
        match self {
            FlowEvent::Begin => "Begin",
            FlowEvent::Sent(_) => "Sent",
            FlowEvent::Mined => "Mined",
            FlowEvent::Missed => "Missed",
            FlowEvent::Completed(_) => "Completed",
            FlowEvent::Fail(_) => "Fail",
            FlowEvent::Reset => "Reset",
        }
    }
}

impl<T> Default for FlowState<T> {
    fn default() -> Self {
        FlowState::Idle
    }
}

impl<T> FlowState<T> {
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "Idle",
            FlowState::Submitting => "Submitting",
            FlowState::AwaitingReceipt { .. } => "AwaitingReceipt",
            FlowState::ExtractingResult { .. } => "ExtractingResult",
            FlowState::Succeeded(_) => "Succeeded",
            FlowState::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Succeeded(_) | FlowState::Failed(_))
    }

    pub fn in_progress(&self) -> bool {
        !self.is_terminal() && !matches!(self, FlowState::Idle)
    }

    /// Hash of the submitted transaction, once there is one
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            FlowState::AwaitingReceipt { tx_hash } | FlowState::ExtractingResult { tx_hash, .. } => {
                Some(*tx_hash)
            }
            _ => None,
        }
    }

    pub fn succeeded(&self) -> Option<&T> {
        match self {
            FlowState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn failed(&self) -> Option<&FlowError> {
        match self {
            FlowState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Applies `event`, consuming the current state.
    pub fn on(self, event: FlowEvent<T>) -> Result<FlowState<T>, Error> {
        let next = match (self, event) {
            (FlowState::Idle | FlowState::Succeeded(_) | FlowState::Failed(_), FlowEvent::Begin) => {
                FlowState::Submitting
            }
            (FlowState::Submitting, FlowEvent::Sent(tx_hash)) => {
                FlowState::AwaitingReceipt { tx_hash }
            }
            (FlowState::AwaitingReceipt { tx_hash }, FlowEvent::Mined) => {
                FlowState::ExtractingResult {
                    tx_hash,
                    attempts: 0,
                }
            }
            (FlowState::ExtractingResult { tx_hash, attempts }, FlowEvent::Missed) => {
                FlowState::ExtractingResult {
                    tx_hash,
                    attempts: attempts.saturating_add(1),
                }
            }
            (
                FlowState::AwaitingReceipt { .. } | FlowState::ExtractingResult { .. },
                FlowEvent::Completed(value),
            ) => FlowState::Succeeded(value),
            (
                FlowState::Submitting
                | FlowState::AwaitingReceipt { .. }
                | FlowState::ExtractingResult { .. },
                FlowEvent::Fail(err),
            ) => FlowState::Failed(err),
            (FlowState::Succeeded(_) | FlowState::Failed(_), FlowEvent::Reset) => FlowState::Idle,
            (state, event) => {
                return Err(Error::InvalidStateForRequestedAction {
                    state: format!("{} on {}", state.label(), event.label()),
                })
            }
        };
        Ok(next)
    }
}
