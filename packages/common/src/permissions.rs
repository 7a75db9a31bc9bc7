use serde::{Deserialize, Serialize};

/// Membership role inside a space
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "ADMIN")]
    Admin,
    #[default]
    #[serde(alias = "PARTICIPANT")]
    Participant,
    #[serde(alias = "VISITOR")]
    Visitor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewSpace,
    EditSpaceSettings,
    DeleteSpace,
    ManageMembers,

    ViewBlocks,
    CreateBlocks,
    EditBlocks,
    DeleteBlocks,
    ReorderBlocks,
}

impl Role {
    /// Permissions granted by the role alone
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::Admin => &[
                ViewSpace,
                EditSpaceSettings,
                ManageMembers,
                ViewBlocks,
                CreateBlocks,
                EditBlocks,
                DeleteBlocks,
                ReorderBlocks,
            ],
            Role::Participant => &[
                ViewSpace,
                ViewBlocks,
                CreateBlocks,
                EditBlocks,
                DeleteBlocks,
                ReorderBlocks,
            ],
            Role::Visitor => &[ViewSpace, ViewBlocks],
        }
    }
}

/// Deleting a space is reserved to its creator, whatever the role
pub fn has_permission(role: Role, permission: Permission, is_creator: bool) -> bool {
    if permission == Permission::DeleteSpace && is_creator {
        return true;
    }
    role.permissions().contains(&permission)
}
