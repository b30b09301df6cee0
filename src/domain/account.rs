use crate::error::BillingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type AccountId = u64;

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_SUPER_ADMIN: &str = "ROLE_SUPER_ADMIN";

/// Funds available on an account.
///
/// Only [`Account::credit`] and [`Account::debit`] change it, both with
/// checked arithmetic, so it never goes negative and never overflows.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive deposit amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, BillingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BillingError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// The caller's resolved identity, as handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountIdentity {
    email: String,
}

impl AccountIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// A billing account.
///
/// `version` is bumped on every committed balance mutation and lets stores
/// reject a commit computed from a stale read.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub balance: Balance,
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub version: u64,
}

impl Account {
    pub fn new(id: AccountId, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            password_hash: password_hash.into(),
            balance: Balance::ZERO,
            roles: BTreeSet::new(),
            version: 0,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Effective roles; every account holds `ROLE_USER`.
    pub fn effective_roles(&self) -> BTreeSet<String> {
        let mut roles = self.roles.clone();
        roles.insert(ROLE_USER.to_string());
        roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        role == ROLE_USER || self.roles.contains(role)
    }

    /// Credits the balance. Fails, leaving it untouched, when the sum is
    /// not representable.
    pub fn credit(&mut self, amount: Amount) -> Result<(), BillingError> {
        let credited = self.balance.0.checked_add(amount.value()).ok_or_else(|| {
            BillingError::ValidationError(format!(
                "Deposit of {} would overflow the balance",
                amount.value()
            ))
        })?;
        self.balance = Balance(credited);
        Ok(())
    }

    /// Debits the balance if it covers `amount`.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), BillingError> {
        let insufficient = || BillingError::InsufficientFunds {
            required: amount,
            available: self.balance.0,
        };
        if self.balance.0 < amount {
            return Err(insufficient());
        }
        let debited = self.balance.0.checked_sub(amount).ok_or_else(insufficient)?;
        self.balance = Balance(debited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_display_normalizes() {
        assert_eq!(Balance::new(dec!(790.1300)).to_string(), "790.13");
        assert_eq!(Balance::ZERO.to_string(), "0");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(BillingError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(BillingError::ValidationError(_))
        ));
    }

    #[test]
    fn test_account_credit() {
        let mut account = Account::new(1, "user@example.com", "hash");
        account.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();
        assert_eq!(account.balance, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_account_credit_overflow_keeps_balance() {
        let mut account = Account::new(1, "user@example.com", "hash");
        account.balance = Balance::new(dec!(1000));

        let result = account.credit(Amount::new(Decimal::MAX).unwrap());
        assert!(matches!(result, Err(BillingError::ValidationError(_))));
        assert_eq!(account.balance, Balance::new(dec!(1000)));
    }

    #[test]
    fn test_account_debit_success() {
        let mut account = Account::new(1, "user@example.com", "hash");
        account.balance = Balance::new(dec!(10.0));

        assert!(account.debit(dec!(10.0)).is_ok());
        assert_eq!(account.balance, Balance::ZERO);
    }

    #[test]
    fn test_account_debit_insufficient() {
        let mut account = Account::new(1, "user@example.com", "hash");
        account.balance = Balance::new(dec!(10.0));

        let result = account.debit(dec!(20.0));
        assert!(matches!(
            result,
            Err(BillingError::InsufficientFunds { .. })
        ));
        assert_eq!(account.balance, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_roles_always_include_user() {
        let admin = Account::new(1, "admin@example.com", "hash").with_roles([ROLE_SUPER_ADMIN]);
        assert!(admin.has_role(ROLE_USER));
        assert!(admin.has_role(ROLE_SUPER_ADMIN));
        assert_eq!(admin.effective_roles().len(), 2);

        let user = Account::new(2, "user@example.com", "hash");
        assert!(!user.has_role(ROLE_SUPER_ADMIN));
    }
}
