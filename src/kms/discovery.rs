use std::io::ErrorKind;

use drm::control::{connector, crtc, encoder, Device as ControlDevice, Mode, ResourceHandles};
use log::debug;

use crate::core::geometry::DisplayMode;
use crate::error::DeviceError;

/// Connector, encoder and CRTC chosen to drive the output
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub connector: connector::Handle,
    pub encoder: encoder::Handle,
    pub crtc: crtc::Handle,
    pub mode: Mode,
}

impl Route {
    pub fn display_mode(&self) -> DisplayMode {
        let (width, height) = self.mode.size();
        DisplayMode::new(width.into(), height.into(), self.mode.vrefresh())
    }
}

fn not_found(message: &str) -> DeviceError {
    DeviceError::other("discover", ErrorKind::NotFound, message)
}

/// First connected connector with at least one mode, driven at its
/// preferred (first) mode through its current encoder and CRTC
pub fn find_route<C: ControlDevice>(card: &C) -> Result<Route, DeviceError> {
    let resources = card
        .resource_handles()
        .map_err(|e| DeviceError::new("get resources", e))?;

    let (connector, mode) = resources
        .connectors()
        .iter()
        .filter_map(|&handle| card.get_connector(handle, false).ok())
        .inspect(|info| debug!("connector {:?}: {:?}", info.handle(), info.state()))
        .find(|info| info.state() == connector::State::Connected && !info.modes().is_empty())
        .map(|info| {
            let preferred = info.modes()[0];
            (info, preferred)
        })
        .ok_or_else(|| not_found("no connected connector with modes"))?;

    let encoder = connector
        .current_encoder()
        .or_else(|| connector.encoders().first().copied())
        .ok_or_else(|| not_found("connector has no encoder"))?;
    let encoder_info = card
        .get_encoder(encoder)
        .map_err(|e| DeviceError::new("get encoder", e))?;

    let crtc = encoder_info
        .crtc()
        .or_else(|| first_possible_crtc(&resources, &encoder_info))
        .ok_or_else(|| not_found("encoder has no usable CRTC"))?;

    Ok(Route {
        connector: connector.handle(),
        encoder,
        crtc,
        mode,
    })
}

fn first_possible_crtc(
    resources: &ResourceHandles,
    encoder: &encoder::Info,
) -> Option<crtc::Handle> {
    resources
        .filter_crtcs(encoder.possible_crtcs())
        .into_iter()
        .next()
}
