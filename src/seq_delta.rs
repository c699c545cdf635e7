/// Structural change to a sequence, as fired by a [Batchable](crate::Batchable) stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqDelta<A> {
    Include { index: usize, elem: A },
    Remove { index: usize, elem: A },
    Update { index: usize, old: A, new: A },
    /// Several changes fired together, in their original order
    Batch(Vec<SeqDelta<A>>),
}

impl<A> SeqDelta<A> {
    /// Leaf changes in order, with nested batches expanded
    pub fn flatten(self) -> Vec<SeqDelta<A>> {
        match self {
            SeqDelta::Batch(deltas) => deltas.into_iter().flat_map(SeqDelta::flatten).collect(),
            delta => vec![delta],
        }
    }

    /// Apply the change to `seq`. Indices past the end are clamped for inserts and
    /// ignored for removals and updates.
    pub fn apply_to(&self, seq: &mut Vec<A>)
    where
        A: Clone,
    {
        match self {
            SeqDelta::Include { index, elem } => seq.insert((*index).min(seq.len()), elem.clone()),
            SeqDelta::Remove { index, .. } => {
                if *index < seq.len() {
                    seq.remove(*index);
                }
            }
            SeqDelta::Update { index, new, .. } => {
                if let Some(slot) = seq.get_mut(*index) {
                    *slot = new.clone();
                }
            }
            SeqDelta::Batch(deltas) => deltas.iter().for_each(|d| d.apply_to(seq)),
        }
    }
}
