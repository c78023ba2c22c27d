use serde::Deserialize;
use serde::Serialize;

use crate::transfer::CashRegister;
use crate::transfer::UserId;

/// Identity supplied by the surrounding application for every write.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, parse_display::Display)]
#[display("caller=(id={id} role={role})")]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, parse_display::Display)]
#[serde(rename_all = "snake_case")]
#[display(style = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl Caller {
    pub const fn admin(id: UserId) -> Self {
        Self { id, role: Role::Admin }
    }

    pub const fn member(id: UserId) -> Self {
        Self { id, role: Role::Member }
    }

    /// Admins write against any register, members only against the ones they own.
    pub fn may_write_against(&self, register: &CashRegister) -> bool {
        self.role == Role::Admin || register.owner == self.id
    }
}
