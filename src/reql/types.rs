//! ReQL query, response and error type codes.

use serde::{Deserialize, Serialize};

/// Query type, the first element of every request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum QueryType {
    Start = 1,
    Continue = 2,
    Stop = 3,
    NoreplyWait = 4,
    ServerInfo = 5,
}

impl QueryType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueryType::Start => "START",
            QueryType::Continue => "CONTINUE",
            QueryType::Stop => "STOP",
            QueryType::NoreplyWait => "NOREPLY_WAIT",
            QueryType::ServerInfo => "SERVER_INFO",
        }
    }
}

impl TryFrom<u64> for QueryType {
    type Error = u64;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Start),
            2 => Ok(Self::Continue),
            3 => Ok(Self::Stop),
            4 => Ok(Self::NoreplyWait),
            5 => Ok(Self::ServerInfo),
            other => Err(other),
        }
    }
}

/// Response type, the first element of every response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseType {
    SuccessAtom = 1,
    SuccessSequence = 2,
    SuccessPartial = 3,
    WaitComplete = 4,
    ServerInfo = 5,
    ClientError = 16,
    CompileError = 17,
    RuntimeError = 18,
}

impl ResponseType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ResponseType::ClientError | ResponseType::CompileError | ResponseType::RuntimeError
        )
    }
}

impl TryFrom<u64> for ResponseType {
    type Error = u64;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::SuccessAtom),
            2 => Ok(Self::SuccessSequence),
            3 => Ok(Self::SuccessPartial),
            4 => Ok(Self::WaitComplete),
            5 => Ok(Self::ServerInfo),
            16 => Ok(Self::ClientError),
            17 => Ok(Self::CompileError),
            18 => Ok(Self::RuntimeError),
            other => Err(other),
        }
    }
}

/// Subtype of a RUNTIME_ERROR, carried in the `e` response field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    Internal,
    ResourceLimit,
    QueryLogic,
    NonExistence,
    OpFailed,
    OpIndeterminate,
    User,
    PermissionError,
}

impl ErrorType {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1_000_000 => Some(Self::Internal),
            2_000_000 => Some(Self::ResourceLimit),
            3_000_000 => Some(Self::QueryLogic),
            3_100_000 => Some(Self::NonExistence),
            4_100_000 => Some(Self::OpFailed),
            4_200_000 => Some(Self::OpIndeterminate),
            5_000_000 => Some(Self::User),
            6_000_000 => Some(Self::PermissionError),
            _ => None,
        }
    }

    pub fn code(self) -> u64 {
        match self {
            Self::Internal => 1_000_000,
            Self::ResourceLimit => 2_000_000,
            Self::QueryLogic => 3_000_000,
            Self::NonExistence => 3_100_000,
            Self::OpFailed => 4_100_000,
            Self::OpIndeterminate => 4_200_000,
            Self::User => 5_000_000,
            Self::PermissionError => 6_000_000,
        }
    }
}
