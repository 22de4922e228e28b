//! Software-emulated speaker groups
//!
//! One zone acts as the group controller; confirmed changes to its power,
//! volume, mute and source are mirrored to every member by issuing the
//! equivalent commands through the shared session queue. Synchronization is
//! strictly one-directional - a member changed directly keeps its change to
//! itself.
//!
//! Groups exist only in software and only for the session; the amplifier's
//! native group feature is not used. Membership is held as plain zone-id maps
//! (controller → members, member → controller), never as object links, and
//! every mutation happens under one lock so a disband cannot race an
//! in-flight propagation.

use crate::error::{Result, SdkError};
use nuvo_protocol::{Command, Frame, ZoneId};
use nuvo_session::{Session, SessionError};
use nuvo_state::{StateChange, StateStore, ZoneState};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// A zone's place in the grouping state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GroupRole {
    /// Not grouped
    Solo,
    /// Mirrors its state to one or more members
    Controller,
    /// Mirrors the named controller
    Member(ZoneId),
}

/// One group, as seen from outside the engine
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupMembership {
    pub controller: ZoneId,
    pub members: BTreeSet<ZoneId>,
}

/// Membership index. Invariants, enforced by the mutators below:
/// a zone is a controller or a member, never both; a member belongs to
/// exactly one controller; a controller never appears in its own member set;
/// an emptied group is deleted.
#[derive(Debug, Default)]
struct GroupRegistry {
    members: HashMap<ZoneId, BTreeSet<ZoneId>>,
    member_of: HashMap<ZoneId, ZoneId>,
}

impl GroupRegistry {
    fn role(&self, zone: ZoneId) -> GroupRole {
        if self.members.contains_key(&zone) {
            GroupRole::Controller
        } else if let Some(controller) = self.member_of.get(&zone) {
            GroupRole::Member(*controller)
        } else {
            GroupRole::Solo
        }
    }

    fn insert_member(&mut self, controller: ZoneId, member: ZoneId) {
        self.member_of.insert(member, controller);
        self.members.entry(controller).or_default().insert(member);
    }

    /// Detach a member; removes the group entirely if it became empty
    fn remove_member(&mut self, member: ZoneId) -> Option<ZoneId> {
        let controller = self.member_of.remove(&member)?;
        if let Some(set) = self.members.get_mut(&controller) {
            set.remove(&member);
            if set.is_empty() {
                self.members.remove(&controller);
            }
        }
        Some(controller)
    }

    /// Remove a whole group, returning its former members in id order
    fn take_group(&mut self, controller: ZoneId) -> BTreeSet<ZoneId> {
        let members = self.members.remove(&controller).unwrap_or_default();
        for member in &members {
            self.member_of.remove(member);
        }
        members
    }
}

/// The group synchronization engine
///
/// Cheap to clone; all clones share the registry. Controller state changes
/// are observed through the state store's change broadcast (a background task
/// started by the system), so keypad-originated controller changes propagate
/// exactly like SDK-originated ones.
#[derive(Clone)]
pub struct GroupEngine {
    session: Session,
    store: StateStore,
    registry: Arc<Mutex<GroupRegistry>>,
}

impl GroupEngine {
    pub(crate) fn new(session: Session, store: StateStore) -> Self {
        Self {
            session,
            store,
            registry: Arc::new(Mutex::new(GroupRegistry::default())),
        }
    }

    /// Start the propagation task: watches the store's change stream and
    /// mirrors controller transitions to members.
    pub(crate) fn spawn_propagation(&self) {
        let engine = self.clone();
        let mut changes = engine.store.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => engine.handle_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "group engine lagged behind state changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// A zone's current grouping role
    pub async fn role(&self, zone: ZoneId) -> GroupRole {
        self.registry.lock().await.role(zone)
    }

    /// The group a zone takes part in, if any
    pub async fn membership(&self, zone: ZoneId) -> Option<GroupMembership> {
        let registry = self.registry.lock().await;
        let controller = match registry.role(zone) {
            GroupRole::Solo => return None,
            GroupRole::Controller => zone,
            GroupRole::Member(controller) => controller,
        };
        Some(GroupMembership {
            controller,
            members: registry.members.get(&controller).cloned().unwrap_or_default(),
        })
    }

    /// Make `controller` mirror its state to `members`
    ///
    /// Members joining from another group leave it first; a member that was
    /// itself a controller has its own group disbanded first. New members are
    /// immediately synchronized to the controller's power, source, mute and
    /// volume so the group starts coherent. Re-joining an existing member
    /// just refreshes that synchronization. An empty member list is a no-op.
    pub async fn join(&self, controller: ZoneId, members: &[ZoneId]) -> Result<()> {
        let mut registry = self.registry.lock().await;

        if members.contains(&controller) {
            return Err(SdkError::InvalidGroupOperation(format!(
                "{controller} cannot join itself"
            )));
        }
        let mut controller_state = self.known_zone(controller)?;
        let member_set: BTreeSet<ZoneId> = members.iter().copied().collect();
        for member in &member_set {
            self.known_zone(*member)?;
        }
        if member_set.is_empty() {
            return Ok(());
        }
        if let GroupRole::Member(other) = registry.role(controller) {
            return Err(SdkError::InvalidGroupOperation(format!(
                "{controller} is already a member of {other}'s group"
            )));
        }

        // The controller must be live so its source and volume are real
        // values to hand to the members.
        if !controller_state.power {
            let ack = self
                .session
                .command(Command::SetPower {
                    zone: controller,
                    on: true,
                })
                .await?;
            merge_status(&mut controller_state, &ack);
        }

        for member in member_set {
            match registry.role(member) {
                GroupRole::Controller => {
                    debug!(%member, "joining zone controlled its own group, disbanding it");
                    self.disband_locked(&mut registry, member).await;
                }
                GroupRole::Member(previous) if previous != controller => {
                    debug!(%member, %previous, "member switching groups");
                    registry.remove_member(member);
                }
                _ => {}
            }
            registry.insert_member(controller, member);
            debug!(%controller, %member, "member joined, pushing controller state");
            self.sync_member(member, &controller_state).await;
        }
        Ok(())
    }

    /// Remove a zone from grouping
    ///
    /// For a member this is a plain leave: the zone returns to solo with its
    /// state untouched. For a controller it disbands the whole group, and
    /// every former member is commanded off.
    pub async fn leave(&self, zone: ZoneId) -> Result<()> {
        let mut registry = self.registry.lock().await;
        match registry.role(zone) {
            GroupRole::Controller => {
                debug!(%zone, "controller left, disbanding group");
                self.disband_locked(&mut registry, zone).await;
            }
            GroupRole::Member(controller) => {
                debug!(%zone, %controller, "member left group");
                registry.remove_member(zone);
            }
            GroupRole::Solo => {}
        }
        Ok(())
    }

    /// React to one confirmed state transition
    async fn handle_change(&self, change: StateChange) {
        if !change.is_group_relevant() {
            return;
        }
        let Some(zone) = change.zone() else {
            return;
        };
        let mut registry = self.registry.lock().await;

        // Power-off ends participation: a controller going dark disbands its
        // group, a member going dark quietly leaves.
        if matches!(change, StateChange::PowerChanged { new: false, .. }) {
            match registry.role(zone) {
                GroupRole::Controller => {
                    debug!(%zone, "controller powered off, disbanding group");
                    self.disband_locked(&mut registry, zone).await;
                }
                GroupRole::Member(controller) => {
                    debug!(%zone, %controller, "member powered off, leaving group");
                    registry.remove_member(zone);
                }
                GroupRole::Solo => {}
            }
            return;
        }

        let Some(members) = registry.members.get(&zone) else {
            // Member- or solo-originated change: nothing propagates
            return;
        };
        let members: Vec<ZoneId> = members.iter().copied().collect();
        for member in members {
            let command = match &change {
                StateChange::PowerChanged { new, .. } => Command::SetPower {
                    zone: member,
                    on: *new,
                },
                StateChange::MuteChanged { new, .. } => Command::SetMute {
                    zone: member,
                    mute: *new,
                },
                StateChange::VolumeChanged { new, .. } => Command::SetVolume {
                    zone: member,
                    volume: *new,
                },
                StateChange::SourceChanged { new, .. } => Command::SetSource {
                    zone: member,
                    source: *new,
                },
                _ => continue,
            };
            if !self.issue_fanout(command).await {
                break;
            }
        }
    }

    /// Push the controller's current audible state onto one member
    async fn sync_member(&self, member: ZoneId, controller: &ZoneState) {
        let mut commands = vec![Command::SetPower {
            zone: member,
            on: true,
        }];
        if let Some(source) = controller.source {
            commands.push(Command::SetSource {
                zone: member,
                source,
            });
        }
        if controller.mute {
            commands.push(Command::SetMute {
                zone: member,
                mute: true,
            });
        } else {
            commands.push(Command::SetMute {
                zone: member,
                mute: false,
            });
            if let Some(volume) = controller.volume {
                commands.push(Command::SetVolume {
                    zone: member,
                    volume,
                });
            }
        }
        for command in commands {
            if !self.issue_fanout(command).await {
                break;
            }
        }
    }

    /// Disband a group: every member returns to solo and is commanded off.
    /// Must be called with the registry lock held.
    async fn disband_locked(&self, registry: &mut GroupRegistry, controller: ZoneId) {
        for member in registry.take_group(controller) {
            if !self
                .issue_fanout(Command::SetPower {
                    zone: member,
                    on: false,
                })
                .await
            {
                break;
            }
        }
    }

    /// Issue one fan-out command. Failures are reported but never abort the
    /// remaining members - except a dead link, which ends the sequence.
    async fn issue_fanout(&self, command: Command) -> bool {
        match self.session.command(command.clone()).await {
            Ok(_) => true,
            Err(e @ (SessionError::Disconnected(_) | SessionError::Closed)) => {
                warn!(?command, error = %e, "fan-out halted, link lost");
                false
            }
            Err(e) => {
                warn!(?command, error = %e, "fan-out command failed, continuing");
                true
            }
        }
    }

    /// Look a zone up, rejecting unknown or disabled zones before any
    /// command is issued
    fn known_zone(&self, zone: ZoneId) -> Result<ZoneState> {
        self.store
            .zone(zone)
            .filter(|z| z.enabled)
            .ok_or_else(|| SdkError::InvalidGroupOperation(format!("unknown zone {zone}")))
    }
}

/// Fold a power-on acknowledgement into a locally-held zone state
pub(crate) fn merge_status(state: &mut ZoneState, ack: &Frame) {
    if let Frame::ZoneStatus(status) = ack {
        state.power = status.power;
        state.mute = status.mute;
        if let Some(source) = status.source {
            state.source = Some(source);
        }
        if let Some(volume) = status.volume {
            state.volume = Some(volume);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn zone(id: u8) -> ZoneId {
        ZoneId::new(id).unwrap()
    }

    #[test]
    fn test_registry_roles() {
        let mut registry = GroupRegistry::default();
        assert_eq!(registry.role(zone(1)), GroupRole::Solo);

        registry.insert_member(zone(1), zone(2));
        assert_eq!(registry.role(zone(1)), GroupRole::Controller);
        assert_eq!(registry.role(zone(2)), GroupRole::Member(zone(1)));
    }

    #[test]
    fn test_empty_group_is_deleted() {
        let mut registry = GroupRegistry::default();
        registry.insert_member(zone(1), zone(2));
        assert_eq!(registry.remove_member(zone(2)), Some(zone(1)));
        assert_eq!(registry.role(zone(1)), GroupRole::Solo);
        assert!(registry.members.is_empty());
        assert!(registry.member_of.is_empty());
    }

    #[test]
    fn test_take_group_clears_all_members() {
        let mut registry = GroupRegistry::default();
        registry.insert_member(zone(1), zone(2));
        registry.insert_member(zone(1), zone(3));

        let members = registry.take_group(zone(1));
        assert_eq!(members, BTreeSet::from([zone(2), zone(3)]));
        assert_eq!(registry.role(zone(2)), GroupRole::Solo);
        assert_eq!(registry.role(zone(3)), GroupRole::Solo);
    }

    #[test]
    fn test_members_iterate_in_id_order() {
        let mut registry = GroupRegistry::default();
        for m in [9, 3, 12, 5] {
            registry.insert_member(zone(1), zone(m));
        }
        let order: Vec<u8> = registry
            .members
            .get(&zone(1))
            .unwrap()
            .iter()
            .map(|z| z.get())
            .collect();
        assert_eq!(order, vec![3, 5, 9, 12]);
    }

    /// Registry invariants hold under arbitrary mutation sequences: no zone
    /// is both controller and member, every member maps to exactly one
    /// existing group, and no controller lists itself.
    #[derive(Debug, Clone)]
    enum Op {
        Insert(u8, u8),
        Remove(u8),
        Take(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u8..=8, 1u8..=8).prop_map(|(c, m)| Op::Insert(c, m)),
            (1u8..=8).prop_map(Op::Remove),
            (1u8..=8).prop_map(Op::Take),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_invariants(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut registry = GroupRegistry::default();
            for op in ops {
                match op {
                    // Mirror the engine's guards: no self-join, and a zone
                    // acting as member or controller elsewhere is detached
                    // first, exactly as join() does.
                    Op::Insert(c, m) if c != m => {
                        if registry.members.contains_key(&zone(m)) {
                            registry.take_group(zone(m));
                        }
                        if registry.member_of.contains_key(&zone(c)) {
                            continue;
                        }
                        registry.remove_member(zone(m));
                        registry.insert_member(zone(c), zone(m));
                    }
                    Op::Insert(..) => {}
                    Op::Remove(m) => {
                        registry.remove_member(zone(m));
                    }
                    Op::Take(c) => {
                        registry.take_group(zone(c));
                    }
                }

                for (controller, members) in &registry.members {
                    prop_assert!(!members.contains(controller), "controller in own member set");
                    prop_assert!(
                        !registry.member_of.contains_key(controller),
                        "zone is controller and member at once"
                    );
                    prop_assert!(!members.is_empty(), "empty group retained");
                    for member in members {
                        prop_assert_eq!(registry.member_of.get(member), Some(controller));
                    }
                }
                for (member, controller) in &registry.member_of {
                    let set = registry.members.get(controller);
                    prop_assert!(set.is_some_and(|s| s.contains(member)));
                }
            }
        }
    }
}
