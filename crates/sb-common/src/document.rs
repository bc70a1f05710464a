//! Printable views of invoices and splits. Every amount is rounded to cents
//! here; the records they are built from keep full precision.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{percent_of, round_currency};
use crate::types::{
    ClientRecord, CommissionRecord, ContributionType, InvoiceRecord, InvoiceStatus,
    LineItemRecord, ProjectRecord, SplitSummaryRecord, TeamMemberRecord,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartyBlock {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub tax: Option<Decimal>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDocument {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub bill_to: PartyBlock,
    pub project_name: String,
    pub lines: Vec<DocumentLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
}

impl InvoiceDocument {
    pub fn build(
        invoice: &InvoiceRecord,
        client: &ClientRecord,
        project: &ProjectRecord,
        line_items: &[LineItemRecord],
    ) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            paid_date: invoice.paid_date,
            bill_to: PartyBlock {
                name: client.name.clone(),
                email: client.email.clone(),
                company: client.company.clone(),
                address: client.address.clone(),
                phone: client.phone.clone(),
            },
            project_name: project.name.clone(),
            lines: line_items
                .iter()
                .map(|line| DocumentLine {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    rate: round_currency(line.rate),
                    tax: line.tax,
                    amount: round_currency(line.amount),
                })
                .collect(),
            subtotal: round_currency(invoice.subtotal),
            tax: round_currency(invoice.tax),
            total: round_currency(invoice.total),
            notes: invoice.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitMemberLine {
    pub role: Option<String>,
    pub contribution_type: ContributionType,
    pub contribution: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitAgentLine {
    pub agent_name: String,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitDocument {
    pub split_id: Uuid,
    pub project_name: String,
    pub client_name: String,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub team_members: Vec<SplitMemberLine>,
    pub team_total: Decimal,
    pub agent: Option<SplitAgentLine>,
    pub commission: Decimal,
    pub company_profit_percentage: Decimal,
    pub company_profit: Decimal,
}

pub struct SplitDocumentParts<'a> {
    pub summary: &'a SplitSummaryRecord,
    pub project: &'a ProjectRecord,
    pub client: &'a ClientRecord,
    pub invoice: &'a InvoiceRecord,
    pub members: &'a [TeamMemberRecord],
    pub commission: Option<&'a CommissionRecord>,
}

impl SplitDocument {
    /// Member amounts are recomputed from each contribution against the
    /// summary's total so the document matches what the split recorded.
    pub fn build(parts: SplitDocumentParts<'_>) -> Self {
        let total = parts.summary.total_amount;
        let team_members = parts
            .members
            .iter()
            .map(|member| {
                // The split was computed from these same figures, so the
                // share fits.
                let share = match member.contribution_type {
                    ContributionType::Percentage => {
                        percent_of(total, member.contribution).unwrap_or_default()
                    }
                    ContributionType::Fixed => member.contribution,
                };
                SplitMemberLine {
                    role: member.role.clone(),
                    contribution_type: member.contribution_type,
                    contribution: member.contribution,
                    amount: round_currency(share),
                }
            })
            .collect();

        let agent = parts.commission.map(|c| SplitAgentLine {
            agent_name: c.agent_name.clone(),
            rate: c.rate,
            amount: round_currency(parts.summary.commission),
        });

        Self {
            split_id: parts.summary.split_id,
            project_name: parts.project.name.clone(),
            client_name: parts.client.name.clone(),
            invoice_number: parts.invoice.invoice_number.clone(),
            total_amount: round_currency(total),
            team_members,
            team_total: round_currency(parts.summary.team_total),
            agent,
            commission: round_currency(parts.summary.commission),
            company_profit_percentage: parts.summary.company_profit_percentage,
            company_profit: round_currency(parts.summary.company_profit),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{InvoiceDocument, SplitDocument, SplitDocumentParts};
    use crate::types::{
        ClientRecord, CommissionRecord, ContributionType, InvoiceRecord, InvoiceStatus,
        LineItemRecord, ProjectRecord, ProjectStatus, SplitSummaryRecord, TeamMemberRecord,
    };

    fn fixtures() -> (ClientRecord, ProjectRecord, InvoiceRecord) {
        let client = ClientRecord {
            client_id: Uuid::new_v4(),
            name: "Acme".to_string(),
            email: "billing@acme.test".to_string(),
            phone: None,
            company: Some("Acme Ltd".to_string()),
            address: None,
            created_at: Utc::now(),
        };
        let project = ProjectRecord {
            project_id: Uuid::new_v4(),
            client_id: client.client_id,
            name: "Website".to_string(),
            description: None,
            status: ProjectStatus::Active,
            deadline: None,
            created_at: Utc::now(),
        };
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
        let invoice = InvoiceRecord {
            invoice_id: Uuid::new_v4(),
            invoice_number: "INV-2024-0001".to_string(),
            project_id: project.project_id,
            subtotal: dec!(99.995),
            tax: dec!(0.005),
            total: dec!(100.000),
            status: InvoiceStatus::Sent,
            notes: None,
            issue_date: day,
            due_date: day,
            paid_date: None,
            created_at: Utc::now(),
        };
        (client, project, invoice)
    }

    #[test]
    fn invoice_document_rounds_amounts() {
        let (client, project, invoice) = fixtures();
        let line = LineItemRecord {
            line_item_id: Uuid::new_v4(),
            invoice_id: invoice.invoice_id,
            description: "Build".to_string(),
            quantity: dec!(3),
            rate: dec!(33.3317),
            tax: None,
            amount: dec!(99.9951),
        };

        let doc = InvoiceDocument::build(&invoice, &client, &project, &[line]);
        assert_eq!(doc.subtotal, dec!(100.00));
        assert_eq!(doc.tax, dec!(0.00));
        assert_eq!(doc.lines[0].amount, dec!(100.00));
        assert_eq!(doc.bill_to.company.as_deref(), Some("Acme Ltd"));
        assert_eq!(doc.project_name, "Website");
    }

    #[test]
    fn split_document_lists_member_amounts() {
        let (client, project, invoice) = fixtures();
        let summary = SplitSummaryRecord {
            split_id: Uuid::new_v4(),
            project_id: project.project_id,
            invoice_id: invoice.invoice_id,
            total_amount: dec!(1000),
            team_total: dec!(500),
            commission: dec!(100),
            company_profit: dec!(250),
            company_profit_percentage: dec!(25),
            created_at: Utc::now(),
        };
        let member = |contribution_type, contribution| TeamMemberRecord {
            member_id: Uuid::new_v4(),
            project_id: project.project_id,
            user_id: None,
            split_id: Some(summary.split_id),
            role: Some("dev".to_string()),
            contribution_type,
            contribution,
        };
        let members = vec![
            member(ContributionType::Percentage, dec!(40)),
            member(ContributionType::Fixed, dec!(100)),
        ];
        let commission = CommissionRecord {
            commission_id: Uuid::new_v4(),
            project_id: project.project_id,
            agent_name: "Dana".to_string(),
            rate: dec!(10),
        };

        let doc = SplitDocument::build(SplitDocumentParts {
            summary: &summary,
            project: &project,
            client: &client,
            invoice: &invoice,
            members: &members,
            commission: Some(&commission),
        });
        assert_eq!(doc.team_members[0].amount, dec!(400));
        assert_eq!(doc.team_members[1].amount, dec!(100));
        assert_eq!(doc.agent.as_ref().map(|a| a.amount), Some(dec!(100)));
        assert_eq!(doc.client_name, "Acme");
        assert_eq!(doc.company_profit, dec!(250));
    }
}
