use crate::auth::AuthChallenge;
use crate::image::ImageReference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub image: ImageReference,
    pub tags: Vec<String>,
}

/// An image whose tag list needs user credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub image: ImageReference,
    pub challenge: AuthChallenge,
    /// Index of this entry in the pending list.
    pub position: usize,
}

/// Outcome of the resolution phase: images with tags, and images waiting
/// for credentials. An image is never in both.
#[derive(Debug, Default)]
pub struct ClassificationStore {
    resolved: Vec<ResolvedImage>,
    pending: Vec<PendingAuthorization>,
}

impl ClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resolved(&mut self, image: ImageReference, tags: Vec<String>) {
        self.resolved.push(ResolvedImage { image, tags });
    }

    pub fn add_pending(&mut self, image: ImageReference, challenge: AuthChallenge) {
        let position = self.pending.len();
        self.pending.push(PendingAuthorization {
            image,
            challenge,
            position,
        });
    }

    pub fn resolved(&self) -> &[ResolvedImage] {
        &self.resolved
    }

    pub fn pending(&self) -> &[PendingAuthorization] {
        &self.pending
    }

    /// Removes the given pending positions.
    ///
    /// Removal runs from the highest index down so the remaining indices stay
    /// valid while removing, then the survivors are renumbered.
    pub fn remove_pending(&mut self, positions: &[usize]) {
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        for position in positions {
            if position < self.pending.len() {
                self.pending.remove(position);
            }
        }

        for (index, entry) in self.pending.iter_mut().enumerate() {
            entry.position = index;
        }
    }
}
