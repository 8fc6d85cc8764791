use drm::control::{crtc, plane, Device as ControlDevice, PlaneType};
use drm::ClientCapability;
use log::debug;

/// Unused overlay plane that can be attached to `crtc`
pub fn find_overlay<C: ControlDevice>(card: &C, crtc: crtc::Handle) -> Option<plane::Handle> {
    // Without universal planes only overlays are listed, which is still fine.
    if let Err(e) = card.set_client_capability(ClientCapability::UniversalPlanes, true) {
        debug!("universal planes unavailable: {}", e);
    }

    let resources = card.resource_handles().ok()?;
    let planes = card.plane_handles().ok()?;

    planes.into_iter().find(|&handle| {
        let Ok(info) = card.get_plane(handle) else {
            return false;
        };
        let usable = info.crtc().is_none()
            && resources.filter_crtcs(info.possible_crtcs()).contains(&crtc);
        usable && plane_type(card, handle).map_or(true, |t| t == PlaneType::Overlay as u64)
    })
}

/// Raw value of the plane's `type` property
fn plane_type<C: ControlDevice>(card: &C, handle: plane::Handle) -> Option<u64> {
    let properties = card.get_properties(handle).ok()?;
    let (ids, values) = properties.as_props_and_values();

    ids.iter().zip(values).find_map(|(&id, &value)| {
        let info = card.get_property(id).ok()?;
        (info.name().to_bytes() == b"type").then_some(value)
    })
}
