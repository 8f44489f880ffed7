// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the termination reasons of the dispatch loops.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Callback polled by the dispatch loops. Returning true stops the motion.
pub type StoppingPredicate<'a> = &'a mut dyn FnMut() -> bool;

/// Why a dispatch loop returned.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// All configurations were sent, or the trajectory finished.
    Reached,
    /// The stopping predicate fired.
    Stopped,
    /// An interpolated pose had no IK solution.
    IkFailure,
    /// A blocking trajectory did not finish in time.
    Timeout,
    /// A non-blocking trajectory was handed to the sink.
    Sent,
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReasonCode::Reached => "reached",
            ReasonCode::Stopped => "stop_func fired",
            ReasonCode::IkFailure => "IK failure",
            ReasonCode::Timeout => "timeout",
            ReasonCode::Sent => "sent",
        };
        write!(f, "{}", name)
    }
}
