//! Capabilities composed into every model serializer

use crate::classifier::RelationClassifier;
use crate::guard::ForbiddenFieldGuard;
use crate::uniqueness::UniquenessRevalidator;

/// Write-side behaviour of one serializer
///
/// The classifier is always present. Deferred uniqueness checks and the
/// forbidden-on-create guard are only attached when the serializer asks for
/// them.
#[derive(Debug, Clone)]
pub struct RecordWriter {
	classifier: RelationClassifier,
	uniqueness: Option<UniquenessRevalidator>,
	guard: Option<ForbiddenFieldGuard>,
}

impl RecordWriter {
	pub fn new(classifier: RelationClassifier) -> Self {
		Self {
			classifier,
			uniqueness: None,
			guard: None,
		}
	}

	pub fn with_uniqueness(mut self, uniqueness: UniquenessRevalidator) -> Self {
		self.uniqueness = Some(uniqueness);
		self
	}

	pub fn with_guard(mut self, guard: ForbiddenFieldGuard) -> Self {
		self.guard = Some(guard);
		self
	}

	pub fn classifier(&self) -> &RelationClassifier {
		&self.classifier
	}

	pub fn uniqueness(&self) -> Option<&UniquenessRevalidator> {
		self.uniqueness.as_ref()
	}

	pub fn guard(&self) -> Option<&ForbiddenFieldGuard> {
		self.guard.as_ref()
	}
}
