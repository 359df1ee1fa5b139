use replaylens_core::{BoundaryEvent, Entity};
use serde::Serialize;
use std::ops::Range;

use crate::WindowError;

/// A contiguous run of entities between two compactions. The range is
/// half-open over entity indices; a trailing window after a boundary on
/// the last entity is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Window<'a> {
    pub number: usize,
    pub range: Range<usize>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    #[serde(skip)]
    pub entities: &'a [Entity],
}

impl<'a> Window<'a> {
    pub fn first_index(&self) -> Option<usize> {
        (!self.range.is_empty()).then_some(self.range.start)
    }

    pub fn last_index(&self) -> Option<usize> {
        (!self.range.is_empty()).then(|| self.range.end - 1)
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range.contains(&index)
    }
}

/// Tiles `entities` into windows closed by each boundary entity.
///
/// Window 0 runs from the first entity through the first boundary; window k
/// runs from just after boundary k-1 through boundary k; the last window
/// holds whatever follows the final boundary.
pub fn build_windows<'a>(
    entities: &'a [Entity],
    boundaries: &[BoundaryEvent],
) -> Result<Vec<Window<'a>>, WindowError> {
    let mut previous: Option<usize> = None;
    for boundary in boundaries {
        if boundary.entity_index >= entities.len() {
            return Err(WindowError::BoundaryOutOfRange {
                entity_index: boundary.entity_index,
                entity_count: entities.len(),
            });
        }
        if let Some(previous) = previous {
            if boundary.entity_index <= previous {
                return Err(WindowError::UnorderedBoundaries {
                    previous,
                    next: boundary.entity_index,
                });
            }
        }
        previous = Some(boundary.entity_index);
    }

    if entities.is_empty() {
        return Ok(Vec::new());
    }

    let ends = boundaries
        .iter()
        .map(|boundary| boundary.entity_index + 1)
        .chain(std::iter::once(entities.len()));

    let mut windows = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0usize;
    for (number, end) in ends.enumerate() {
        let slice = &entities[start..end];
        windows.push(Window {
            number,
            range: start..end,
            start_ts: slice.first().and_then(Entity::timestamp_ms),
            end_ts: slice.last().and_then(Entity::timestamp_ms),
            entities: slice,
        });
        start = end;
    }
    Ok(windows)
}
