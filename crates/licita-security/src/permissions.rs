use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use licita_common::{LicitaError, Principal, Role};

/// Named operation a principal may be allowed to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateProcess,
    EditProcess,
    DeleteProcess,
    ApproveProcess,
    ViewAllProposals,
    ViewProcessProposals,
    SubmitProposal,
    ViewOwnProposal,
    RegisterBuyer,
    RegisterSupplier,
    ViewReports,
    ExportReports,
    ViewAuditLog,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::CreateProcess,
        Action::EditProcess,
        Action::DeleteProcess,
        Action::ApproveProcess,
        Action::ViewAllProposals,
        Action::ViewProcessProposals,
        Action::SubmitProposal,
        Action::ViewOwnProposal,
        Action::RegisterBuyer,
        Action::RegisterSupplier,
        Action::ViewReports,
        Action::ExportReports,
        Action::ViewAuditLog,
        Action::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateProcess => "create_process",
            Action::EditProcess => "edit_process",
            Action::DeleteProcess => "delete_process",
            Action::ApproveProcess => "approve_process",
            Action::ViewAllProposals => "view_all_proposals",
            Action::ViewProcessProposals => "view_process_proposals",
            Action::SubmitProposal => "submit_proposal",
            Action::ViewOwnProposal => "view_own_proposal",
            Action::RegisterBuyer => "register_buyer",
            Action::RegisterSupplier => "register_supplier",
            Action::ViewReports => "view_reports",
            Action::ExportReports => "export_reports",
            Action::ViewAuditLog => "view_audit_log",
            Action::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LicitaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| LicitaError::Unknown {
                kind: "action",
                value: wanted.to_string(),
            })
    }
}

// ============================================================================
// Allow-sets
// ============================================================================

const ADMIN: &[Action] = &Action::ALL;

const BUYER: &[Action] = &[
    Action::CreateProcess,
    Action::EditProcess,
    Action::ViewProcessProposals,
    Action::ViewReports,
];

const BUYER_SENIOR: &[Action] = &[
    Action::CreateProcess,
    Action::EditProcess,
    Action::DeleteProcess,
    Action::ViewProcessProposals,
    Action::ViewReports,
    Action::ExportReports,
];

// Managers approve and supervise; process authoring stays with buyers.
const MANAGER: &[Action] = &[
    Action::EditProcess,
    Action::DeleteProcess,
    Action::ApproveProcess,
    Action::ViewAllProposals,
    Action::ViewProcessProposals,
    Action::RegisterBuyer,
    Action::ViewReports,
    Action::ExportReports,
];

const SUPPLIER: &[Action] = &[Action::SubmitProposal, Action::ViewOwnProposal];

const AUDITOR: &[Action] = &[
    Action::ViewAllProposals,
    Action::ViewReports,
    Action::ExportReports,
    Action::ViewAuditLog,
];

/// Static permission matrix
pub struct AccessControl;

impl AccessControl {
    /// Allow-set of a role
    pub fn actions(role: Role) -> &'static [Action] {
        match role {
            Role::Admin => ADMIN,
            Role::Buyer => BUYER,
            Role::BuyerSenior => BUYER_SENIOR,
            Role::Manager => MANAGER,
            Role::Supplier => SUPPLIER,
            Role::Auditor => AUDITOR,
        }
    }

    pub fn allows(role: Role, action: Action) -> bool {
        Self::actions(role).contains(&action)
    }

    /// Checks against the principal's effective role (access level applied)
    pub fn allows_principal(principal: &Principal, action: Action) -> bool {
        Self::allows(principal.effective_role(), action)
    }

    /// String entry point; unknown names are denied
    pub fn allows_named(role: &str, action: &str) -> bool {
        match (role.parse::<Role>(), action.parse::<Action>()) {
            (Ok(role), Ok(action)) => Self::allows(role, action),
            _ => false,
        }
    }

    /// Only admin passes every page-level role restriction
    pub fn bypasses_page_gate(role: Role) -> bool {
        role == Role::Admin
    }
}
