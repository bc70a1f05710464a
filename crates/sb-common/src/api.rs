use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{InvoiceTemplate, LineItemRecord, SplitSummaryRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub boot_id: Option<String>,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthMeResponse {
    pub auth_method: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateProjectRequest {
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateProjectRequest {
    pub client_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<NaiveDate>,
}

/// One team member's stake as submitted by a form. `contribution_type` is
/// kept as text so an unknown value is reported alongside every other
/// problem in the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMemberEntry {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub role: Option<String>,
    pub contribution_type: String,
    pub contribution: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateTeamMemberRequest {
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
    pub contribution_type: Option<String>,
    pub contribution: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEntry {
    pub agent_name: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateCommissionRequest {
    pub agent_name: Option<String>,
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub tax: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateLineItemRequest {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub tax: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateInvoiceRequest {
    pub project_id: Uuid,
    pub invoice_number: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateInvoiceRequest {
    pub invoice_number: Option<String>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceWithLineItems {
    #[serde(flatten)]
    pub invoice: crate::types::InvoiceRecord,
    pub line_items: Vec<LineItemRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRecurringRequest {
    pub project_id: Uuid,
    pub frequency: String,
    pub next_issue_date: NaiveDate,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub template: InvoiceTemplate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateRecurringRequest {
    pub project_id: Option<Uuid>,
    pub frequency: Option<String>,
    pub next_issue_date: Option<NaiveDate>,
    pub enabled: Option<bool>,
    pub template: Option<InvoiceTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitPreviewRequest {
    pub total_amount: Decimal,
    #[serde(default)]
    pub team_members: Vec<TeamMemberEntry>,
    #[serde(default)]
    pub agent: Option<AgentEntry>,
    pub company_profit_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSplitRequest {
    pub project_id: Uuid,
    pub invoice_id: Uuid,
    /// Defaults to the invoice's total.
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub team_members: Vec<TeamMemberEntry>,
    #[serde(default)]
    pub agent: Option<AgentEntry>,
    pub company_profit_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitShares {
    pub team_total: Decimal,
    pub commission: Decimal,
    pub company_profit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitPreviewResponse {
    pub total_amount: Decimal,
    pub company_profit_percentage: Decimal,
    /// Unrounded results.
    pub exact: SplitShares,
    /// Cent-rounded results, as they would be persisted.
    pub rounded: SplitShares,
    pub member_shares: Vec<Decimal>,
    pub company_profit_nominal: Decimal,
    pub unallocated: Decimal,
    pub over_allocated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSplitResponse {
    pub summary: SplitSummaryRecord,
    pub team_members: Vec<crate::types::TeamMemberRecord>,
    pub commission: Option<crate::types::CommissionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub pending_amount: Decimal,
    pub pending_count: u64,
    pub overdue_amount: Decimal,
    pub overdue_count: u64,
    pub paid_amount: Decimal,
    pub paid_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueResponse {
    pub recurring_id: Uuid,
    pub invoice_id: Uuid,
    pub next_issue_date: NaiveDate,
}
