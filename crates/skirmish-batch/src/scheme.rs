//! Field registry describing what a batch stores per `(slot, t)`.
//!
//! The [`Scheme`] is the batch's "phone book": every field is registered
//! once with its flattened per-step length and the [`FieldGroup`] that
//! tells the runner when to write it. It uses `IndexMap` so iteration order
//! (and therefore the storage layout) follows registration order.

use indexmap::IndexMap;
use skirmish_core::{names, EnvInfo, ObservationKind};

use crate::error::BatchError;

/// When during a collection round a field is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// Observation data for timestep `t`, available before acting
    /// (entities, masks, avail_actions, state, obs). Writing these marks
    /// the cell filled.
    PreTransition,
    /// Transition outcome recorded at timestep `t` after stepping
    /// (reward, terminated).
    PostTransition,
    /// Actions chosen at timestep `t`.
    Action,
}

/// A registered field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, unique within the scheme.
    pub name: String,
    /// Flattened number of `f32` values per `(slot, t)` cell.
    pub len: usize,
    /// When the runner writes this field.
    pub group: FieldGroup,
}

/// Ordered set of fields stored in an [`EpisodeBatch`](crate::EpisodeBatch).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scheme {
    fields: IndexMap<String, FieldSpec>,
}

impl Scheme {
    /// Create an empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field.
    ///
    /// # Errors
    ///
    /// [`BatchError::DuplicateField`] if `name` is already registered,
    /// [`BatchError::EmptyField`] if `len` is zero.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        len: usize,
        group: FieldGroup,
    ) -> Result<&mut Self, BatchError> {
        let name = name.into();
        if len == 0 {
            return Err(BatchError::EmptyField { field: name });
        }
        if self.fields.contains_key(&name) {
            return Err(BatchError::DuplicateField { field: name });
        }
        self.fields.insert(
            name.clone(),
            FieldSpec {
                name,
                len,
                group,
            },
        );
        Ok(self)
    }

    /// Build the standard scheme for an environment.
    ///
    /// Registers the pre-transition fields for `kind`, then `reward`,
    /// `terminated`, and `actions`.
    pub fn from_env_info(info: &EnvInfo, kind: ObservationKind) -> Result<Self, BatchError> {
        let mut scheme = Self::new();
        match kind {
            ObservationKind::Entity => {
                scheme
                    .register(
                        names::ENTITIES,
                        info.n_entities * info.entity_dim,
                        FieldGroup::PreTransition,
                    )?
                    .register(
                        names::OBS_MASK,
                        info.n_entities * info.n_entities,
                        FieldGroup::PreTransition,
                    )?
                    .register(names::ENTITY_MASK, info.n_entities, FieldGroup::PreTransition)?;
                if info.has_gt_mask {
                    scheme.register(
                        names::GT_MASK,
                        info.n_entities * info.n_entities,
                        FieldGroup::PreTransition,
                    )?;
                }
            }
            ObservationKind::Flat => {
                scheme
                    .register(names::STATE, info.state_dim, FieldGroup::PreTransition)?
                    .register(
                        names::OBS,
                        info.n_agents * info.obs_dim,
                        FieldGroup::PreTransition,
                    )?;
            }
        }
        scheme
            .register(
                names::AVAIL_ACTIONS,
                info.n_agents * info.n_actions,
                FieldGroup::PreTransition,
            )?
            .register(names::REWARD, 1, FieldGroup::PostTransition)?
            .register(names::TERMINATED, 1, FieldGroup::PostTransition)?
            .register(names::ACTIONS, info.n_agents, FieldGroup::Action)?;
        Ok(scheme)
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Storage index of a field (registration order).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    /// Field at a storage index.
    pub fn get_index(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get_index(index).map(|(_, spec)| spec)
    }

    /// Iterate over all fields in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Iterate over fields written in `group`.
    pub fn fields_in(&self, group: FieldGroup) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values().filter(move |spec| spec.group == group)
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> EnvInfo {
        EnvInfo {
            episode_limit: 10,
            n_agents: 3,
            n_actions: 6,
            n_entities: 5,
            entity_dim: 4,
            state_dim: 12,
            obs_dim: 7,
            has_gt_mask: false,
        }
    }

    #[test]
    fn entity_scheme_shapes() {
        let s = Scheme::from_env_info(&info(), ObservationKind::Entity).unwrap();
        assert_eq!(s.get(names::ENTITIES).unwrap().len, 20);
        assert_eq!(s.get(names::OBS_MASK).unwrap().len, 25);
        assert_eq!(s.get(names::ENTITY_MASK).unwrap().len, 5);
        assert_eq!(s.get(names::AVAIL_ACTIONS).unwrap().len, 18);
        assert_eq!(s.get(names::ACTIONS).unwrap().len, 3);
        assert!(s.get(names::GT_MASK).is_none());
        assert!(s.get(names::STATE).is_none());
    }

    #[test]
    fn entity_scheme_registers_gt_mask_when_reported() {
        let mut i = info();
        i.has_gt_mask = true;
        let s = Scheme::from_env_info(&i, ObservationKind::Entity).unwrap();
        assert_eq!(s.get(names::GT_MASK).unwrap().len, 25);
    }

    #[test]
    fn flat_scheme_shapes() {
        let s = Scheme::from_env_info(&info(), ObservationKind::Flat).unwrap();
        assert_eq!(s.get(names::STATE).unwrap().len, 12);
        assert_eq!(s.get(names::OBS).unwrap().len, 21);
        assert!(s.get(names::ENTITIES).is_none());
    }

    #[test]
    fn groups_partition_fields() {
        let s = Scheme::from_env_info(&info(), ObservationKind::Entity).unwrap();
        let pre: Vec<_> = s
            .fields_in(FieldGroup::PreTransition)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            pre,
            vec![
                names::ENTITIES,
                names::OBS_MASK,
                names::ENTITY_MASK,
                names::AVAIL_ACTIONS
            ]
        );
        assert_eq!(s.fields_in(FieldGroup::PostTransition).count(), 2);
        assert_eq!(s.fields_in(FieldGroup::Action).count(), 1);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut s = Scheme::new();
        s.register("x", 1, FieldGroup::PreTransition).unwrap();
        assert_eq!(
            s.register("x", 2, FieldGroup::PreTransition).unwrap_err(),
            BatchError::DuplicateField { field: "x".into() }
        );
    }

    #[test]
    fn zero_length_rejected() {
        let mut s = Scheme::new();
        assert!(matches!(
            s.register("x", 0, FieldGroup::Action),
            Err(BatchError::EmptyField { .. })
        ));
    }

    #[test]
    fn entity_scheme_with_zero_entities_fails() {
        let mut i = info();
        i.n_entities = 0;
        assert!(Scheme::from_env_info(&i, ObservationKind::Entity).is_err());
    }
}
