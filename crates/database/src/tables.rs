//! Table names shared by callers. These are symbolic only; no schema is enforced here.

pub const TABLE_REFUND_REQUESTS: &str = "refund_requests";
pub const TABLE_VENDING_MACHINE_REQUESTS: &str = "vending_machine_requests";
pub const TABLE_BALANCES: &str = "balances";
pub const TABLE_TRANSACTIONS: &str = "transactions";
