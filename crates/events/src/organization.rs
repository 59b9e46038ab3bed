use pantry_core::OrganizationId;

use crate::EventEnvelope;

/// Marks messages that belong to exactly one organization.
///
/// Workers use this to stay pinned to one organization's stream and skip
/// everything else.
pub trait OrganizationScoped {
    fn organization_id(&self) -> OrganizationId;
}

impl<E> OrganizationScoped for EventEnvelope<E> {
    fn organization_id(&self) -> OrganizationId {
        EventEnvelope::organization_id(self)
    }
}
