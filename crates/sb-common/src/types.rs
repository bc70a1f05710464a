use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    TeamMember,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurringFrequency {
    Daily,
    Weekly,
    Monthly,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }

            pub fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("|")
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(UserRole { Admin => "admin", TeamMember => "team_member" });
text_enum!(ProjectStatus { Active => "active", Completed => "completed" });
text_enum!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Overdue => "overdue",
});
text_enum!(ContributionType { Percentage => "percentage", Fixed => "fixed" });
text_enum!(RecurringFrequency {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientRecord {
    pub client_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMemberRecord {
    pub member_id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    /// Set when the row was written as part of a persisted split.
    pub split_id: Option<Uuid>,
    pub role: Option<String>,
    pub contribution_type: ContributionType,
    pub contribution: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionRecord {
    pub commission_id: Uuid,
    pub project_id: Uuid,
    pub agent_name: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceRecord {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub project_id: Uuid,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemRecord {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    /// Tax as a percentage of `amount`.
    pub tax: Option<Decimal>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateLine {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub tax: Option<Decimal>,
}

/// What a recurring schedule copies into each invoice it issues.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceTemplate {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub line_items: Vec<TemplateLine>,
    #[serde(default)]
    pub payment_terms_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringInvoiceRecord {
    pub recurring_id: Uuid,
    pub project_id: Uuid,
    pub frequency: RecurringFrequency,
    pub next_issue_date: NaiveDate,
    pub enabled: bool,
    pub last_invoice_id: Option<Uuid>,
    pub template: InvoiceTemplate,
    pub created_at: DateTime<Utc>,
}

/// Immutable snapshot of one computed split for an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitSummaryRecord {
    pub split_id: Uuid,
    pub project_id: Uuid,
    pub invoice_id: Uuid,
    pub total_amount: Decimal,
    pub team_total: Decimal,
    pub commission: Decimal,
    pub company_profit: Decimal,
    pub company_profit_percentage: Decimal,
    pub created_at: DateTime<Utc>,
}
