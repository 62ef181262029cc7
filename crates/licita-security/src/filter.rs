//! Per-role record visibility.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use licita_common::{normalize_tax_id, Principal, ProcessRecord, ProposalRecord, Role};

/// Kind of records being listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCategory {
    Processes,
    Proposals,
    /// Anything else passes through unfiltered
    Other(String),
}

impl FromStr for RecordCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "processes" | "processos" => RecordCategory::Processes,
            "proposals" | "propostas" => RecordCategory::Proposals,
            other => RecordCategory::Other(other.to_string()),
        })
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordCategory::Processes => f.write_str("processes"),
            RecordCategory::Proposals => f.write_str("proposals"),
            RecordCategory::Other(name) => f.write_str(name),
        }
    }
}

/// Visibility decision for one record
pub trait Scoped {
    fn visible_to(&self, filter: &DataFilter) -> bool;
}

impl Scoped for ProcessRecord {
    fn visible_to(&self, filter: &DataFilter) -> bool {
        match filter.role {
            Role::Admin | Role::BuyerSenior | Role::Manager => true,
            Role::Buyer => self.owner_id == filter.principal_id,
            Role::Supplier => self.deadline.map_or(false, |d| d > filter.now),
            Role::Auditor => true,
        }
    }
}

impl Scoped for ProposalRecord {
    fn visible_to(&self, filter: &DataFilter) -> bool {
        match filter.role {
            Role::Admin | Role::Manager | Role::Auditor => true,
            Role::Buyer | Role::BuyerSenior => filter.owned_processes.contains(&self.process_id),
            Role::Supplier => match &filter.tax_id {
                Some(own) => normalize_tax_id(&self.company_tax_id) == *own,
                None => false,
            },
        }
    }
}

/// Restricts record lists to what the principal may see
#[derive(Debug, Clone)]
pub struct DataFilter {
    principal_id: String,
    role: Role,
    tax_id: Option<String>,
    now: DateTime<Utc>,
    owned_processes: HashSet<String>,
}

impl DataFilter {
    pub fn new(principal: &Principal, now: DateTime<Utc>) -> Self {
        Self {
            principal_id: principal.id.clone(),
            role: principal.effective_role(),
            tax_id: principal
                .tax_id
                .as_deref()
                .map(normalize_tax_id)
                .filter(|t| !t.is_empty()),
            now,
            owned_processes: HashSet::new(),
        }
    }

    /// Loads the processes used to join buyer proposals to owned processes.
    /// Proposals may reference a process by id or by number.
    pub fn with_processes(mut self, processes: &[ProcessRecord]) -> Self {
        for process in processes.iter().filter(|p| p.owner_id == self.principal_id) {
            self.owned_processes.insert(process.id.clone());
            if !process.number.is_empty() {
                self.owned_processes.insert(process.number.clone());
            }
        }
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Visible subset, original order kept
    pub fn filter<R: Scoped + Clone>(&self, records: &[R], category: &RecordCategory) -> Vec<R> {
        match category {
            RecordCategory::Other(_) => records.to_vec(),
            _ => records
                .iter()
                .filter(|r| r.visible_to(self))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use licita_common::{AccessLevel, ProcessStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn process(id: &str, owner: &str, deadline: Option<DateTime<Utc>>) -> ProcessRecord {
        ProcessRecord {
            id: id.to_string(),
            number: format!("{}/2024", id),
            title: format!("Processo {}", id),
            owner_id: owner.to_string(),
            deadline,
            status: ProcessStatus::Active,
            modality: None,
        }
    }

    fn proposal(id: &str, process_id: &str, tax_id: &str) -> ProposalRecord {
        ProposalRecord {
            id: id.to_string(),
            protocol: format!("PROP-{}", id),
            process_id: process_id.to_string(),
            company_tax_id: tax_id.to_string(),
            company_name: "ACME".to_string(),
            total: None,
            submitted_at: None,
            status: "enviada".to_string(),
        }
    }

    fn processes() -> Vec<ProcessRecord> {
        vec![
            process("p1", "u1", Some(now() + Duration::days(3))),
            process("p2", "u2", Some(now() - Duration::days(1))),
            process("p3", "u1", None),
            process("p4", "u3", Some(now())),
        ]
    }

    #[test]
    fn test_buyer_sees_only_own_processes() {
        let buyer = Principal::new("u1", "Ana", Role::Buyer);
        let visible = DataFilter::new(&buyer, now()).filter(&processes(), &RecordCategory::Processes);
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_supplier_sees_open_deadlines_only() {
        let supplier = Principal::new("s1", "ACME", Role::Supplier);
        let visible =
            DataFilter::new(&supplier, now()).filter(&processes(), &RecordCategory::Processes);
        // Deadline equal to now is already closed; no deadline is hidden
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
    }

    #[test]
    fn test_senior_and_manager_see_all_processes() {
        for role in [Role::Admin, Role::BuyerSenior, Role::Manager] {
            let principal = Principal::new("x", "X", role);
            let visible =
                DataFilter::new(&principal, now()).filter(&processes(), &RecordCategory::Processes);
            assert_eq!(visible.len(), 4, "{}", role);
        }
    }

    #[test]
    fn test_access_level_applies_to_processes() {
        let buyer = Principal::new("u1", "Ana", Role::Buyer).with_access_level(AccessLevel::Manager);
        let filter = DataFilter::new(&buyer, now());
        assert_eq!(filter.role(), Role::Manager);
        assert_eq!(filter.filter(&processes(), &RecordCategory::Processes).len(), 4);
    }

    #[test]
    fn test_buyer_proposals_join_on_owned_processes() {
        let buyer = Principal::new("u1", "Ana", Role::Buyer);
        let proposals = vec![
            proposal("a", "p1", "11.111.111/0001-11"),
            proposal("b", "p2", "22.222.222/0001-22"),
            proposal("c", "p3/2024", "33.333.333/0001-33"),
        ];
        let visible = DataFilter::new(&buyer, now())
            .with_processes(&processes())
            .filter(&proposals, &RecordCategory::Proposals);
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        // Without the join nothing is visible
        let none = DataFilter::new(&buyer, now()).filter(&proposals, &RecordCategory::Proposals);
        assert!(none.is_empty());
    }

    #[test]
    fn test_supplier_proposals_match_tax_id_digits() {
        let supplier =
            Principal::new("s1", "ACME", Role::Supplier).with_tax_id("12.345.678/0001-90");
        let proposals = vec![
            proposal("a", "p1", "12345678000190"),
            proposal("b", "p1", "98765432000100"),
            proposal("c", "p2", "12.345.678/0001-90"),
        ];
        let visible =
            DataFilter::new(&supplier, now()).filter(&proposals, &RecordCategory::Proposals);
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let anonymous = Principal::new("s2", "Sem CNPJ", Role::Supplier);
        assert!(DataFilter::new(&anonymous, now())
            .filter(&proposals, &RecordCategory::Proposals)
            .is_empty());
    }

    #[test]
    fn test_other_category_passes_through() {
        let supplier = Principal::new("s1", "ACME", Role::Supplier);
        let records = processes();
        let category: RecordCategory = "contratos".parse().unwrap();
        assert_eq!(
            DataFilter::new(&supplier, now()).filter(&records, &category),
            records
        );
        assert_eq!("propostas".parse::<RecordCategory>().unwrap(), RecordCategory::Proposals);
    }
}
