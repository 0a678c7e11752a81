//! The [`EpisodeBatch`] arena and its read views.

use std::fmt;
use std::sync::Arc;

use skirmish_core::ObservationBundle;

use crate::error::BatchError;
use crate::scheme::{FieldGroup, FieldSpec, Scheme};

/// Time-major buffer for `batch_size` parallel episodes.
///
/// Created with fixed dimensions and never resized. Each scheme field is a
/// zero-initialised `Vec<f32>` of `batch_size * max_seq_length * len`
/// values; the cell for `(slot, t)` starts at
/// `(slot * max_seq_length + t) * len`.
///
/// The batch is exclusively owned by the runner during collection and is
/// handed to the caller by value once collection finishes.
pub struct EpisodeBatch {
    scheme: Arc<Scheme>,
    batch_size: usize,
    max_seq_length: usize,
    /// One buffer per scheme field, in scheme order.
    data: Vec<Vec<f32>>,
    /// `filled[slot * max_seq_length + t]`.
    filled: Vec<bool>,
}

impl EpisodeBatch {
    /// Allocate a batch for `batch_size` slots of `max_seq_length` steps.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidDimensions`] if either dimension is zero or
    /// the scheme has no fields.
    pub fn new(
        scheme: Arc<Scheme>,
        batch_size: usize,
        max_seq_length: usize,
    ) -> Result<Self, BatchError> {
        if batch_size == 0 || max_seq_length == 0 {
            return Err(BatchError::InvalidDimensions {
                reason: format!(
                    "batch_size ({batch_size}) and max_seq_length ({max_seq_length}) \
                     must both be at least 1"
                ),
            });
        }
        if scheme.is_empty() {
            return Err(BatchError::InvalidDimensions {
                reason: "scheme has no fields".into(),
            });
        }
        let cells = batch_size * max_seq_length;
        let data = scheme.iter().map(|spec| vec![0.0; cells * spec.len]).collect();
        Ok(Self {
            scheme,
            batch_size,
            max_seq_length,
            data,
            filled: vec![false; cells],
        })
    }

    /// The field registry this batch was built from.
    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Number of parallel episode slots.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Length of the time axis (`episode_limit + 1`).
    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }

    fn check_cell(&self, slot: usize, t: usize) -> Result<usize, BatchError> {
        if slot >= self.batch_size {
            return Err(BatchError::SlotOutOfRange {
                slot,
                batch_size: self.batch_size,
            });
        }
        if t >= self.max_seq_length {
            return Err(BatchError::TimestepOutOfRange {
                t,
                max_seq_length: self.max_seq_length,
            });
        }
        Ok(slot * self.max_seq_length + t)
    }

    fn resolve(&self, field: &str) -> Result<(usize, &FieldSpec), BatchError> {
        let index = self
            .scheme
            .index_of(field)
            .ok_or_else(|| BatchError::UnknownField {
                field: field.to_string(),
            })?;
        let spec = self
            .scheme
            .get_index(index)
            .ok_or_else(|| BatchError::UnknownField {
                field: field.to_string(),
            })?;
        Ok((index, spec))
    }

    /// Write one cell of `field`. Does not touch the filled mask.
    pub fn write(
        &mut self,
        field: &str,
        slot: usize,
        t: usize,
        values: &[f32],
    ) -> Result<(), BatchError> {
        let cell = self.check_cell(slot, t)?;
        let (index, spec) = self.resolve(field)?;
        let len = spec.len;
        if values.len() != len {
            return Err(BatchError::ShapeMismatch {
                field: field.to_string(),
                expected: len,
                got: values.len(),
            });
        }
        let start = cell * len;
        self.data[index][start..start + len].copy_from_slice(values);
        Ok(())
    }

    /// Write a single-value field (reward, terminated).
    pub fn write_scalar(
        &mut self,
        field: &str,
        slot: usize,
        t: usize,
        value: f32,
    ) -> Result<(), BatchError> {
        self.write(field, slot, t, &[value])
    }

    /// Write every pre-transition field of the scheme from a worker's
    /// observation bundle, then mark `(slot, t)` filled.
    ///
    /// Fields in the bundle that the scheme does not register are ignored.
    ///
    /// # Errors
    ///
    /// [`BatchError::MissingField`] if the bundle lacks a registered
    /// pre-transition field. Nothing is marked filled in that case.
    pub fn write_observation(
        &mut self,
        bundle: &ObservationBundle,
        slot: usize,
        t: usize,
    ) -> Result<(), BatchError> {
        let scheme = Arc::clone(&self.scheme);
        for spec in scheme.fields_in(FieldGroup::PreTransition) {
            let values = bundle
                .get(&spec.name)
                .ok_or_else(|| BatchError::MissingField {
                    field: spec.name.clone(),
                    slot,
                })?;
            self.write(&spec.name, slot, t, values)?;
        }
        self.mark_filled(slot, t)
    }

    /// Mark `(slot, t)` as holding valid data.
    pub fn mark_filled(&mut self, slot: usize, t: usize) -> Result<(), BatchError> {
        let cell = self.check_cell(slot, t)?;
        self.filled[cell] = true;
        Ok(())
    }

    /// Whether `(slot, t)` holds valid data. Out-of-range cells are unfilled.
    pub fn is_filled(&self, slot: usize, t: usize) -> bool {
        self.check_cell(slot, t)
            .map(|cell| self.filled[cell])
            .unwrap_or(false)
    }

    /// Read one cell of `field`.
    pub fn get(&self, field: &str, slot: usize, t: usize) -> Result<&[f32], BatchError> {
        let cell = self.check_cell(slot, t)?;
        let (index, spec) = self.resolve(field)?;
        let start = cell * spec.len;
        Ok(&self.data[index][start..start + spec.len])
    }

    /// Whole-field view, for consumers that slice the dense array directly.
    pub fn field(&self, field: &str) -> Option<FieldView<'_>> {
        let index = self.scheme.index_of(field)?;
        let spec = self.scheme.get_index(index)?;
        Some(FieldView {
            data: &self.data[index],
            len: spec.len,
            max_seq_length: self.max_seq_length,
        })
    }

    /// Read-only view of one slot.
    pub fn slot(&self, slot: usize) -> Result<SlotView<'_>, BatchError> {
        self.check_cell(slot, 0)?;
        Ok(SlotView { batch: self, slot })
    }

    /// The raw filled mask, `[batch_size * max_seq_length]`, slot-major.
    pub fn filled_mask(&self) -> &[bool] {
        &self.filled
    }

    /// Number of filled timesteps in `slot` (`episode_length + 1` for a
    /// collected episode, `0` for an untouched slot).
    pub fn filled_len(&self, slot: usize) -> usize {
        if slot >= self.batch_size {
            return 0;
        }
        let start = slot * self.max_seq_length;
        self.filled[start..start + self.max_seq_length]
            .iter()
            .filter(|&&f| f)
            .count()
    }

    /// Number of transitions collected in `slot`.
    pub fn episode_length(&self, slot: usize) -> usize {
        self.filled_len(slot).saturating_sub(1)
    }

    /// Longest filled prefix across all slots.
    ///
    /// Training code truncates the time axis to this length.
    pub fn max_filled_len(&self) -> usize {
        (0..self.batch_size)
            .map(|slot| self.filled_len(slot))
            .max()
            .unwrap_or(0)
    }

    /// Memory held by field data and the filled mask, in bytes.
    pub fn memory_bytes(&self) -> usize {
        let floats: usize = self.data.iter().map(Vec::len).sum();
        floats * std::mem::size_of::<f32>() + self.filled.len()
    }
}

impl fmt::Debug for EpisodeBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeBatch")
            .field("batch_size", &self.batch_size)
            .field("max_seq_length", &self.max_seq_length)
            .field("fields", &self.scheme.len())
            .field("max_filled_len", &self.max_filled_len())
            .finish()
    }
}

/// Borrowed view of one field across the whole batch.
#[derive(Clone, Copy, Debug)]
pub struct FieldView<'b> {
    data: &'b [f32],
    len: usize,
    max_seq_length: usize,
}

impl<'b> FieldView<'b> {
    /// Values per `(slot, t)` cell.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: registered fields have at least one value per cell.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dense `[slot, t, len]` data.
    pub fn as_slice(&self) -> &'b [f32] {
        self.data
    }

    /// One cell, or `None` if out of range.
    pub fn at(&self, slot: usize, t: usize) -> Option<&'b [f32]> {
        if t >= self.max_seq_length {
            return None;
        }
        let start = (slot * self.max_seq_length + t) * self.len;
        self.data.get(start..start + self.len)
    }
}

/// Borrowed view of one episode slot.
#[derive(Clone, Copy)]
pub struct SlotView<'b> {
    batch: &'b EpisodeBatch,
    slot: usize,
}

impl<'b> SlotView<'b> {
    /// The slot index.
    pub fn index(&self) -> usize {
        self.slot
    }

    /// Read `field` at `t`.
    pub fn get(&self, field: &str, t: usize) -> Result<&'b [f32], BatchError> {
        self.batch.get(field, self.slot, t)
    }

    /// Whether `t` holds valid data.
    pub fn is_filled(&self, t: usize) -> bool {
        self.batch.is_filled(self.slot, t)
    }

    /// Number of transitions collected in this slot.
    pub fn episode_length(&self) -> usize {
        self.batch.episode_length(self.slot)
    }
}

impl fmt::Debug for SlotView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotView")
            .field("slot", &self.slot)
            .field("episode_length", &self.episode_length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::names;

    fn scheme() -> Arc<Scheme> {
        let mut s = Scheme::new();
        s.register(names::ENTITIES, 4, FieldGroup::PreTransition)
            .unwrap()
            .register(names::AVAIL_ACTIONS, 2, FieldGroup::PreTransition)
            .unwrap()
            .register(names::REWARD, 1, FieldGroup::PostTransition)
            .unwrap()
            .register(names::ACTIONS, 2, FieldGroup::Action)
            .unwrap();
        Arc::new(s)
    }

    fn bundle(v: f32) -> ObservationBundle {
        ObservationBundle::new()
            .with(names::ENTITIES, vec![v; 4])
            .with(names::AVAIL_ACTIONS, vec![1.0, 0.0])
    }

    #[test]
    fn new_batch_is_zeroed_and_unfilled() {
        let b = EpisodeBatch::new(scheme(), 3, 6).unwrap();
        assert_eq!(b.filled_mask().len(), 18);
        assert!(b.filled_mask().iter().all(|&f| !f));
        assert_eq!(b.get(names::ENTITIES, 2, 5).unwrap(), &[0.0; 4]);
        assert_eq!(b.max_filled_len(), 0);
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(matches!(
            EpisodeBatch::new(scheme(), 0, 5),
            Err(BatchError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            EpisodeBatch::new(scheme(), 2, 0),
            Err(BatchError::InvalidDimensions { .. })
        ));
        assert!(EpisodeBatch::new(Arc::new(Scheme::new()), 2, 2).is_err());
    }

    #[test]
    fn cells_do_not_overlap() {
        let mut b = EpisodeBatch::new(scheme(), 2, 3).unwrap();
        b.write(names::ENTITIES, 0, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        b.write(names::ENTITIES, 1, 0, &[5.0, 6.0, 7.0, 8.0]).unwrap();
        assert_eq!(b.get(names::ENTITIES, 0, 2).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(b.get(names::ENTITIES, 1, 0).unwrap(), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(b.get(names::ENTITIES, 0, 1).unwrap(), &[0.0; 4]);
        assert_eq!(b.get(names::ENTITIES, 1, 1).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn write_does_not_mark_filled() {
        let mut b = EpisodeBatch::new(scheme(), 1, 3).unwrap();
        b.write(names::ACTIONS, 0, 0, &[1.0, 2.0]).unwrap();
        b.write_scalar(names::REWARD, 0, 0, 0.5).unwrap();
        assert!(!b.is_filled(0, 0));
    }

    #[test]
    fn write_observation_marks_filled() {
        let mut b = EpisodeBatch::new(scheme(), 2, 4).unwrap();
        b.write_observation(&bundle(1.0), 1, 0).unwrap();
        b.write_observation(&bundle(2.0), 1, 1).unwrap();
        assert!(b.is_filled(1, 0));
        assert!(b.is_filled(1, 1));
        assert!(!b.is_filled(0, 0));
        assert_eq!(b.episode_length(1), 1);
        assert_eq!(b.episode_length(0), 0);
        assert_eq!(b.max_filled_len(), 2);
        assert_eq!(b.get(names::ENTITIES, 1, 1).unwrap(), &[2.0; 4]);
    }

    #[test]
    fn missing_observation_field_is_an_error_and_leaves_cell_unfilled() {
        let mut b = EpisodeBatch::new(scheme(), 1, 2).unwrap();
        let partial = ObservationBundle::new().with(names::ENTITIES, vec![0.0; 4]);
        assert_eq!(
            b.write_observation(&partial, 0, 0).unwrap_err(),
            BatchError::MissingField {
                field: names::AVAIL_ACTIONS.into(),
                slot: 0
            }
        );
        assert!(!b.is_filled(0, 0));
    }

    #[test]
    fn extra_bundle_fields_are_ignored() {
        let mut b = EpisodeBatch::new(scheme(), 1, 2).unwrap();
        let extra = bundle(0.0).with("scenario", vec![0.0, 1.0]);
        b.write_observation(&extra, 0, 0).unwrap();
        assert!(b.is_filled(0, 0));
    }

    #[test]
    fn shape_mismatch_rejected() {
        let mut b = EpisodeBatch::new(scheme(), 1, 2).unwrap();
        assert_eq!(
            b.write(names::ACTIONS, 0, 0, &[1.0]).unwrap_err(),
            BatchError::ShapeMismatch {
                field: names::ACTIONS.into(),
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn out_of_range_rejected() {
        let mut b = EpisodeBatch::new(scheme(), 2, 3).unwrap();
        assert!(matches!(
            b.write_scalar(names::REWARD, 2, 0, 1.0),
            Err(BatchError::SlotOutOfRange { .. })
        ));
        assert!(matches!(
            b.mark_filled(0, 3),
            Err(BatchError::TimestepOutOfRange { .. })
        ));
        assert!(!b.is_filled(5, 0));
        assert!(matches!(
            b.get("nope", 0, 0),
            Err(BatchError::UnknownField { .. })
        ));
    }

    #[test]
    fn field_view_indexes_cells() {
        let mut b = EpisodeBatch::new(scheme(), 2, 3).unwrap();
        b.write(names::ACTIONS, 1, 2, &[4.0, 5.0]).unwrap();
        let view = b.field(names::ACTIONS).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.as_slice().len(), 2 * 3 * 2);
        assert_eq!(view.at(1, 2), Some(&[4.0, 5.0][..]));
        assert_eq!(view.at(1, 3), None);
        assert_eq!(view.at(2, 0), None);
    }

    #[test]
    fn slot_view_reads_through() {
        let mut b = EpisodeBatch::new(scheme(), 2, 3).unwrap();
        b.write_observation(&bundle(3.0), 1, 0).unwrap();
        let s = b.slot(1).unwrap();
        assert_eq!(s.index(), 1);
        assert!(s.is_filled(0));
        assert_eq!(s.get(names::ENTITIES, 0).unwrap(), &[3.0; 4]);
        assert!(b.slot(2).is_err());
    }

    mod proptests {
        use super::{bundle, scheme};
        use crate::batch::EpisodeBatch;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn filled_prefix_matches_episode_length(
                lengths in proptest::collection::vec(0usize..8, 1..6),
            ) {
                let max_seq_length = 8;
                let mut b = EpisodeBatch::new(scheme(), lengths.len(), max_seq_length).unwrap();
                for (slot, &len) in lengths.iter().enumerate() {
                    for t in 0..=len {
                        b.write_observation(&bundle(t as f32), slot, t).unwrap();
                    }
                }
                for (slot, &len) in lengths.iter().enumerate() {
                    prop_assert_eq!(b.episode_length(slot), len);
                    for t in 0..max_seq_length {
                        prop_assert_eq!(b.is_filled(slot, t), t <= len);
                    }
                }
                prop_assert_eq!(b.max_filled_len(), lengths.iter().max().unwrap() + 1);
            }
        }
    }
}
