use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Income,
    Expense,
    Cogs,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::Cogs => "COGS",
        }
    }

    /// Assets and the cost side of the P&L carry their balance as debit minus credit.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, Self::Asset | Self::Expense | Self::Cogs)
    }

    pub fn is_revenue(&self) -> bool {
        matches!(self, Self::Revenue | Self::Income)
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, Self::Expense | Self::Cogs)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown account type {0}")]
pub struct UnknownAccountType(pub String);

impl FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            "COGS" => Ok(Self::Cogs),
            other => Err(UnknownAccountType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
}

/// Semantic slot a posting routine asks for. Most roles are mapped through
/// [`AccountingSettings`]; cash, bank and opening equity are resolved by
/// chart code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Cash,
    Bank,
    Receivable,
    InventoryAsset,
    Payable,
    OutputTax,
    InputTax,
    OpeningEquity,
    Sales,
    Purchase,
}

impl AccountRole {
    /// Roles carried by the settings row; the rest are looked up by chart code.
    pub fn is_settings_mapped(&self) -> bool {
        !matches!(self, Self::Cash | Self::Bank | Self::OpeningEquity)
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Receivable => "accounts receivable",
            Self::InventoryAsset => "inventory asset",
            Self::Payable => "accounts payable",
            Self::OutputTax => "output tax",
            Self::InputTax => "input tax",
            Self::OpeningEquity => "opening balance equity",
            Self::Sales => "default sales",
            Self::Purchase => "default purchase",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingSettings {
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub ar_account_id: Option<Uuid>,
    pub ap_account_id: Option<Uuid>,
    pub sales_account_id: Option<Uuid>,
    pub purchase_account_id: Option<Uuid>,
    pub output_tax_account_id: Option<Uuid>,
    pub input_tax_account_id: Option<Uuid>,
    pub inventory_asset_account_id: Option<Uuid>,
    pub currency_id: Option<String>,
    pub fiscal_year_start: Option<NaiveDate>,
    pub fiscal_year_end: Option<NaiveDate>,
}

impl AccountingSettings {
    pub fn unmapped(company_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            company_id,
            tenant_id,
            ar_account_id: None,
            ap_account_id: None,
            sales_account_id: None,
            purchase_account_id: None,
            output_tax_account_id: None,
            input_tax_account_id: None,
            inventory_asset_account_id: None,
            currency_id: None,
            fiscal_year_start: None,
            fiscal_year_end: None,
        }
    }

    /// Account mapped for `role`, if the settings row carries that role at all.
    pub fn account_for(&self, role: AccountRole) -> Option<Uuid> {
        match role {
            AccountRole::Receivable => self.ar_account_id,
            AccountRole::Payable => self.ap_account_id,
            AccountRole::Sales => self.sales_account_id,
            AccountRole::Purchase => self.purchase_account_id,
            AccountRole::OutputTax => self.output_tax_account_id,
            AccountRole::InputTax => self.input_tax_account_id,
            AccountRole::InventoryAsset => self.inventory_asset_account_id,
            AccountRole::Cash | AccountRole::Bank | AccountRole::OpeningEquity => None,
        }
    }

    pub fn assign(&mut self, role: AccountRole, account_id: Uuid) {
        match role {
            AccountRole::Receivable => self.ar_account_id = Some(account_id),
            AccountRole::Payable => self.ap_account_id = Some(account_id),
            AccountRole::Sales => self.sales_account_id = Some(account_id),
            AccountRole::Purchase => self.purchase_account_id = Some(account_id),
            AccountRole::OutputTax => self.output_tax_account_id = Some(account_id),
            AccountRole::InputTax => self.input_tax_account_id = Some(account_id),
            AccountRole::InventoryAsset => self.inventory_asset_account_id = Some(account_id),
            AccountRole::Cash | AccountRole::Bank | AccountRole::OpeningEquity => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub role: AccountRole,
}

pub trait ChartTemplate: Send + Sync {
    fn name(&self) -> &'static str;
    fn accounts(&self) -> &'static [AccountTemplate];

    fn code_for(&self, role: AccountRole) -> Option<&'static str> {
        self.accounts()
            .iter()
            .find(|template| template.role == role)
            .map(|template| template.code)
    }
}

const CLINIC_ACCOUNTS: [AccountTemplate; 10] = [
    AccountTemplate {
        code: "1000",
        name: "Cash",
        account_type: AccountType::Asset,
        role: AccountRole::Cash,
    },
    AccountTemplate {
        code: "1100",
        name: "Bank",
        account_type: AccountType::Asset,
        role: AccountRole::Bank,
    },
    AccountTemplate {
        code: "1200",
        name: "Accounts Receivable",
        account_type: AccountType::Asset,
        role: AccountRole::Receivable,
    },
    AccountTemplate {
        code: "1400",
        name: "Inventory",
        account_type: AccountType::Asset,
        role: AccountRole::InventoryAsset,
    },
    AccountTemplate {
        code: "2000",
        name: "Accounts Payable",
        account_type: AccountType::Liability,
        role: AccountRole::Payable,
    },
    AccountTemplate {
        code: "2200",
        name: "Output Tax",
        account_type: AccountType::Liability,
        role: AccountRole::OutputTax,
    },
    AccountTemplate {
        code: "2210",
        name: "Input Tax",
        account_type: AccountType::Asset,
        role: AccountRole::InputTax,
    },
    AccountTemplate {
        code: "3999",
        name: "Opening Balance Equity",
        account_type: AccountType::Equity,
        role: AccountRole::OpeningEquity,
    },
    AccountTemplate {
        code: "4000",
        name: "Sales",
        account_type: AccountType::Revenue,
        role: AccountRole::Sales,
    },
    AccountTemplate {
        code: "5000",
        name: "Purchases / Cost of Goods Sold",
        account_type: AccountType::Cogs,
        role: AccountRole::Purchase,
    },
];

/// Default chart seeded for every clinic company.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClinicChart;

impl ChartTemplate for ClinicChart {
    fn name(&self) -> &'static str {
        "clinic-default"
    }

    fn accounts(&self) -> &'static [AccountTemplate] {
        &CLINIC_ACCOUNTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinic_chart_codes_are_unique_and_cover_every_role() {
        let chart = ClinicChart;
        let mut codes: Vec<_> = chart.accounts().iter().map(|t| t.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), chart.accounts().len());

        assert_eq!(chart.code_for(AccountRole::Receivable), Some("1200"));
        assert_eq!(chart.code_for(AccountRole::Bank), Some("1100"));
        assert_eq!(chart.code_for(AccountRole::OpeningEquity), Some("3999"));
    }

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("cogs".parse::<AccountType>(), Ok(AccountType::Cogs));
        assert!("asset ".parse::<AccountType>().is_ok());
        assert!("loan".parse::<AccountType>().is_err());
    }

    #[test]
    fn settings_only_carry_mapped_roles() {
        let mut settings = AccountingSettings::unmapped(Uuid::new_v4(), Uuid::new_v4());
        let account = Uuid::new_v4();
        settings.assign(AccountRole::Receivable, account);
        settings.assign(AccountRole::Cash, Uuid::new_v4());

        assert_eq!(settings.account_for(AccountRole::Receivable), Some(account));
        assert_eq!(settings.account_for(AccountRole::Cash), None);
    }
}
