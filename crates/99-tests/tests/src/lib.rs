//! End-to-end scenarios exercising the whole framework with mock devices.

#[cfg(test)]
mod support;

#[cfg(test)]
mod capture_display;

#[cfg(test)]
mod voice_pipeline;

#[cfg(test)]
mod multicore_routing;

#[cfg(test)]
mod vision_gating;

#[cfg(test)]
mod lifecycle;
