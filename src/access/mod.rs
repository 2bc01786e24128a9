//! Authorization decisions for the portal.
//!
//! Every check here is a pure function over an [`Actor`] (role plus the set of
//! organizations the user belongs to) and a [`ResourceScope`] describing the
//! record being read or written. Handlers reload the actor on every request and
//! must reject the request whenever a check returns `false`.

pub mod errors;

use std::collections::HashSet;
use std::ops::BitOr;

use uuid::Uuid;

use crate::db::organization_repository::OrganizationRepository;
use crate::models::{
    organization::{Organization, OrganizationMembership},
    task::Task,
    user::{Profile, Role},
    workstream::Workstream,
};

pub use errors::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// Read records of every tenant.
    pub const VIEW_ALL_TENANTS: Self = Self(1 << 0);
    /// Write any record regardless of owner or tenant.
    pub const MUTATE_ANY: Self = Self(1 << 1);
    /// Write records the actor created, is assigned to, or is the subject of.
    pub const MUTATE_OWNED: Self = Self(1 << 2);
    /// Like `MUTATE_OWNED`, restricted to the actor's organizations, plus
    /// `client_no_access` contacts in those organizations.
    pub const MUTATE_OWNED_IN_ORG: Self = Self(1 << 3);
    pub const CREATE_RECORDS: Self = Self(1 << 4);
    pub const INVITE_USERS: Self = Self(1 << 5);
    /// Create organizations and add or remove memberships.
    pub const MANAGE_ORGANIZATIONS: Self = Self(1 << 6);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl Role {
    pub const fn capabilities(self) -> Capabilities {
        use Capabilities as C;
        match self {
            Role::Admin | Role::Manager => C::VIEW_ALL_TENANTS
                .union(C::MUTATE_ANY)
                .union(C::CREATE_RECORDS)
                .union(C::INVITE_USERS)
                .union(C::MANAGE_ORGANIZATIONS),
            Role::User => C::VIEW_ALL_TENANTS
                .union(C::MUTATE_OWNED)
                .union(C::CREATE_RECORDS),
            Role::Client => C::MUTATE_OWNED_IN_ORG
                .union(C::CREATE_RECORDS)
                .union(C::INVITE_USERS),
            Role::ClientNoAccess => C::NONE,
        }
    }

    /// Roles this role may hand out through invitations or role changes.
    pub const fn assignable_roles(self) -> &'static [Role] {
        match self {
            Role::Admin => &Role::ALL,
            Role::Manager => &[Role::User, Role::Client, Role::ClientNoAccess],
            Role::Client => &[Role::Client, Role::ClientNoAccess],
            Role::User | Role::ClientNoAccess => &[],
        }
    }
}

/// The authenticated user as seen by the authorization checks.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub org_ids: HashSet<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role, org_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            user_id,
            role,
            org_ids: org_ids.into_iter().collect(),
        }
    }

    /// Builds the actor from memberships only; the legacy `Profile::org_id`
    /// pointer is ignored.
    pub fn from_profile(profile: &Profile, memberships: &[OrganizationMembership]) -> Self {
        Self::new(
            profile.id,
            profile.role,
            memberships
                .iter()
                .filter(|m| m.user_id == profile.id)
                .map(|m| m.org_id),
        )
    }

    pub fn capabilities(&self) -> Capabilities {
        self.role.capabilities()
    }

    pub fn belongs_to(&self, org_id: Option<Uuid>) -> bool {
        org_id.is_some_and(|id| self.org_ids.contains(&id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub role: Role,
}

/// Tenant and ownership tags of a record.
#[derive(Debug, Clone, Default)]
pub struct ResourceScope {
    pub org_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub assigned_to: Vec<Uuid>,
    /// Set when the record is a user profile.
    pub subject: Option<Subject>,
}

impl ResourceScope {
    pub fn in_org(org_id: Option<Uuid>) -> Self {
        Self {
            org_id,
            ..Default::default()
        }
    }

    pub fn owned_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn assigned(mut self, user_id: Option<Uuid>) -> Self {
        self.assigned_to.extend(user_id);
        self
    }

    pub fn about(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    fn created_or_targets(&self, user_id: Uuid) -> bool {
        self.created_by == Some(user_id)
            || self.assigned_to.contains(&user_id)
            || self.subject.is_some_and(|s| s.user_id == user_id)
    }

    fn is_read_only_contact(&self) -> bool {
        self.subject.is_some_and(|s| s.role == Role::ClientNoAccess)
    }
}

pub trait Scoped {
    fn scope(&self) -> ResourceScope;
}

impl Scoped for Task {
    fn scope(&self) -> ResourceScope {
        ResourceScope::in_org(self.org_id)
            .owned_by(self.created_by)
            .assigned(self.assigned_to)
    }
}

impl Scoped for Workstream {
    fn scope(&self) -> ResourceScope {
        ResourceScope::in_org(self.org_id).owned_by(self.created_by)
    }
}

impl Scoped for Organization {
    fn scope(&self) -> ResourceScope {
        ResourceScope::in_org(Some(self.id))
    }
}

pub fn can_invite_users(actor: &Actor) -> bool {
    actor.capabilities().contains(Capabilities::INVITE_USERS)
}

pub fn allowed_invite_roles(actor: &Actor) -> &'static [Role] {
    if !can_invite_users(actor) {
        return &[];
    }
    actor.role.assignable_roles()
}

/// A role change is allowed only when the actor could assign both the
/// target's current role and the requested one.
pub fn can_assign_role(actor: &Actor, current: Option<Role>, requested: Role) -> bool {
    let allowed = actor.role.assignable_roles();
    allowed.contains(&requested) && current.map_or(true, |role| allowed.contains(&role))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDecision {
    Visible,
    /// Visible to a team role although the record carries no tenant tag.
    VisibleUntagged,
    Hidden,
}

impl ViewDecision {
    pub fn is_visible(self) -> bool {
        !matches!(self, ViewDecision::Hidden)
    }
}

pub fn view_decision(actor: &Actor, scope: &ResourceScope) -> ViewDecision {
    if actor.capabilities().contains(Capabilities::VIEW_ALL_TENANTS) {
        return match scope.org_id {
            Some(_) => ViewDecision::Visible,
            None => ViewDecision::VisibleUntagged,
        };
    }
    if actor.belongs_to(scope.org_id) {
        ViewDecision::Visible
    } else {
        ViewDecision::Hidden
    }
}

pub fn can_view_resource(actor: &Actor, scope: &ResourceScope) -> bool {
    view_decision(actor, scope).is_visible()
}

pub fn can_mutate_resource(actor: &Actor, scope: &ResourceScope) -> bool {
    let caps = actor.capabilities();
    if caps.contains(Capabilities::MUTATE_ANY) {
        return true;
    }
    if caps.contains(Capabilities::MUTATE_OWNED) && scope.created_or_targets(actor.user_id) {
        return true;
    }
    if caps.contains(Capabilities::MUTATE_OWNED_IN_ORG) && actor.belongs_to(scope.org_id) {
        return scope.created_or_targets(actor.user_id) || scope.is_read_only_contact();
    }
    false
}

/// Whether the actor may create a new record tagged with `org_id`.
pub fn can_create_in(actor: &Actor, org_id: Option<Uuid>) -> bool {
    let caps = actor.capabilities();
    caps.contains(Capabilities::CREATE_RECORDS)
        && (caps.contains(Capabilities::VIEW_ALL_TENANTS) || actor.belongs_to(org_id))
}

pub fn can_manage_organizations(actor: &Actor) -> bool {
    actor
        .capabilities()
        .contains(Capabilities::MANAGE_ORGANIZATIONS)
}

fn profile_scopes<'a>(
    profile: &'a Profile,
    memberships: &'a [OrganizationMembership],
) -> impl Iterator<Item = ResourceScope> + 'a {
    let subject = Subject {
        user_id: profile.id,
        role: profile.role,
    };
    let mut org_ids: Vec<Option<Uuid>> = memberships
        .iter()
        .filter(|m| m.user_id == profile.id)
        .map(|m| Some(m.org_id))
        .collect();
    if org_ids.is_empty() {
        org_ids.push(None);
    }
    org_ids
        .into_iter()
        .map(move |org_id| ResourceScope::in_org(org_id).about(subject))
}

/// Profiles span organizations; a profile is visible when any of the
/// target's memberships is.
pub fn can_view_profile(
    actor: &Actor,
    profile: &Profile,
    memberships: &[OrganizationMembership],
) -> bool {
    profile.id == actor.user_id
        || profile_scopes(profile, memberships).any(|scope| can_view_resource(actor, &scope))
}

/// Changing a profile affects the user in every organization they belong to,
/// so the actor must be allowed to mutate it in all of them.
pub fn can_mutate_profile(
    actor: &Actor,
    profile: &Profile,
    memberships: &[OrganizationMembership],
) -> bool {
    profile_scopes(profile, memberships).all(|scope| can_mutate_resource(actor, &scope))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAnomaly {
    NoneFlagged,
    MultipleFlagged(usize),
}

impl PrimaryAnomaly {
    pub fn flagged(self) -> usize {
        match self {
            PrimaryAnomaly::NoneFlagged => 0,
            PrimaryAnomaly::MultipleFlagged(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrimaryResolution<'a> {
    pub membership: &'a OrganizationMembership,
    pub anomaly: Option<PrimaryAnomaly>,
}

impl PrimaryResolution<'_> {
    pub fn inconsistency(&self) -> Option<AccessError> {
        self.anomaly
            .map(|anomaly| AccessError::InconsistentPrimaryState {
                user_id: self.membership.user_id,
                flagged: anomaly.flagged(),
            })
    }
}

/// Picks the user's primary membership.
///
/// Never fails for a non-empty list: with zero or several flagged rows the
/// earliest candidate (by `created_at`, then `id`) wins and the anomaly is
/// reported for out-of-band repair.
pub fn resolve_primary_organization(
    memberships: &[OrganizationMembership],
) -> Option<PrimaryResolution<'_>> {
    let flagged: Vec<&OrganizationMembership> =
        memberships.iter().filter(|m| m.is_primary).collect();

    let (candidates, anomaly) = match flagged.len() {
        1 => {
            return Some(PrimaryResolution {
                membership: flagged[0],
                anomaly: None,
            })
        }
        0 => (
            memberships.iter().collect::<Vec<_>>(),
            PrimaryAnomaly::NoneFlagged,
        ),
        n => (flagged, PrimaryAnomaly::MultipleFlagged(n)),
    };

    candidates
        .into_iter()
        .min_by_key(|m| (m.created_at, m.id))
        .map(|membership| PrimaryResolution {
            membership,
            anomaly: Some(anomaly),
        })
}

/// Makes `membership_id` the user's only primary membership in one
/// transaction. Idempotent.
pub async fn set_primary_organization(
    repo: &dyn OrganizationRepository,
    user_id: Uuid,
    membership_id: Uuid,
) -> Result<OrganizationMembership, AccessError> {
    let invalid = || AccessError::InvalidMembership {
        membership_id,
        user_id,
    };

    let memberships = repo
        .set_primary_membership(user_id, membership_id)
        .await?
        .ok_or_else(invalid)?;

    memberships
        .into_iter()
        .find(|m| m.id == membership_id)
        .ok_or_else(invalid)
}
