//! Driver and capability detection.
//!
//! Everything here is read once when a context is created and is treated as
//! static facts by the rest of the pipeline.

use thiserror::Error;

/// Errors that can occur while creating a context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("GL interface has no GetString entry point")]
    MissingGetString,
    #[error("GL interface failed validation")]
    InvalidInterface,
    #[error("Unrecognized GL version string: {0:?}")]
    UnknownVersion(String),
    #[error("Unrecognized GLSL version string: {0:?}")]
    UnknownGlslVersion(String),
}

/// Which flavour of GL the interface speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlStandard {
    Desktop,
    Es,
}

/// String queries a context needs from the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlString {
    Version,
    ShadingLanguageVersion,
    Vendor,
    Renderer,
}

/// The subset of a GL function table used for detection.
pub trait GlInterface {
    fn standard(&self) -> GlStandard;

    /// Whether the `GetString` entry point was resolved.
    fn has_get_string(&self) -> bool;

    fn get_string(&self, name: GlString) -> Option<String>;

    /// Value of `GL_MAX_TEXTURE_SIZE`.
    fn max_texture_size(&self) -> Option<u32>;

    /// Whether every required entry point is present.
    fn validate(&self) -> bool;
}

/// A `major.minor` version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlVersion {
    pub major: u32,
    pub minor: u32,
}

impl GlVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// Shading language generations, ordered oldest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GlslGeneration {
    /// Desktop GLSL 1.10 and ES GLSL 1.00.
    V110,
    V130,
    V140,
    V150,
    /// Desktop GLSL 3.30 and ES GLSL 3.00.
    V330,
    V400,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlVendor {
    Arm,
    Imagination,
    Intel,
    Qualcomm,
    Nvidia,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlRenderer {
    Tegra2,
    Tegra3,
    PowerVR54x,
    PowerVRRogue,
    Adreno3xx,
    Adreno4xx,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlDriver {
    Mesa,
    Nvidia,
    Chromium,
    Other,
}

/// Capability facts consumed by the layer cache and texture pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuCaps {
    pub max_texture_size: u32,
    /// Whether layers may be packed into a shared atlas.
    pub atlas_layers: bool,
}

impl Default for GpuCaps {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            atlas_layers: true,
        }
    }
}

/// Facts about the driver behind a GL interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextInfo {
    pub standard: GlStandard,
    pub version: GlVersion,
    pub glsl_generation: GlslGeneration,
    pub vendor: GlVendor,
    pub renderer: GlRenderer,
    pub driver: GlDriver,
    pub driver_version: Option<GlVersion>,
    pub max_texture_size: u32,
}

impl ContextInfo {
    /// Probe the interface. Fails if the interface is unusable or reports
    /// versions we cannot interpret.
    pub fn create(interface: &dyn GlInterface) -> Result<Self, GpuError> {
        // GetString has to be checked before the interface is validated.
        if !interface.has_get_string() {
            return Err(GpuError::MissingGetString);
        }

        let version_str = interface.get_string(GlString::Version).unwrap_or_default();
        let renderer_str = interface.get_string(GlString::Renderer).unwrap_or_default();

        if !interface.validate() {
            return Err(GpuError::InvalidInterface);
        }

        let standard = interface.standard();
        let version = parse_gl_version(&version_str)
            .ok_or_else(|| GpuError::UnknownVersion(version_str.clone()))?;

        let glsl_str = interface
            .get_string(GlString::ShadingLanguageVersion)
            .unwrap_or_default();
        let mut glsl_generation = parse_glsl_generation(standard, &glsl_str)
            .ok_or(GpuError::UnknownGlslVersion(glsl_str))?;

        let vendor = parse_vendor(&interface.get_string(GlString::Vendor).unwrap_or_default());

        // Some Qualcomm drivers advertise ES 3.00 but reject valid "#version 300 es"
        // shaders.
        if vendor == GlVendor::Qualcomm {
            glsl_generation = GlslGeneration::V110;
        }

        let renderer = parse_renderer(&renderer_str);
        let (driver, driver_version) = parse_driver(vendor, &renderer_str, &version_str);

        let info = Self {
            standard,
            version,
            glsl_generation,
            vendor,
            renderer,
            driver,
            driver_version,
            max_texture_size: interface.max_texture_size().unwrap_or(2048),
        };
        tracing::debug!(?info, "GL context detected");
        Ok(info)
    }

    /// Capabilities derived from the detected driver.
    pub fn caps(&self) -> GpuCaps {
        GpuCaps {
            max_texture_size: self.max_texture_size,
            // Render-to-subregion of a shared texture is unreliable on this family.
            atlas_layers: self.renderer != GlRenderer::PowerVR54x,
        }
    }
}

/// Parse the `major.minor` prefix of a number, ignoring any trailing text.
fn parse_major_minor(text: &str) -> Option<GlVersion> {
    let token = text.split_whitespace().next()?;
    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor_digits: String = parts
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let minor = minor_digits.parse().ok()?;
    Some(GlVersion::new(major, minor))
}

/// Accepts desktop strings such as `"4.5.0 NVIDIA 450.80"` and ES strings
/// such as `"OpenGL ES 3.0 Mesa 20.0"` or `"OpenGL ES-CM 1.1"`.
pub fn parse_gl_version(version: &str) -> Option<GlVersion> {
    let version = version.trim();
    if let Some(rest) = version.strip_prefix("OpenGL ES") {
        // Skip an optional profile suffix like "-CM".
        let rest = rest.trim_start_matches(|c: char| c != ' ');
        return parse_major_minor(rest.trim_start());
    }
    parse_major_minor(version)
}

pub fn parse_glsl_generation(standard: GlStandard, glsl: &str) -> Option<GlslGeneration> {
    let glsl = glsl.trim();
    let number = match standard {
        GlStandard::Es => glsl.strip_prefix("OpenGL ES GLSL ES")?.trim_start(),
        GlStandard::Desktop => glsl,
    };
    let version = parse_major_minor(number)?;
    let hundredths = version.major * 100 + version.minor;

    let generation = match standard {
        GlStandard::Es if hundredths >= 300 => GlslGeneration::V330,
        GlStandard::Es => GlslGeneration::V110,
        GlStandard::Desktop => match hundredths {
            h if h >= 400 => GlslGeneration::V400,
            h if h >= 330 => GlslGeneration::V330,
            h if h >= 150 => GlslGeneration::V150,
            h if h >= 140 => GlslGeneration::V140,
            h if h >= 130 => GlslGeneration::V130,
            _ => GlslGeneration::V110,
        },
    };
    Some(generation)
}

pub fn parse_vendor(vendor: &str) -> GlVendor {
    match vendor.trim() {
        "ARM" => GlVendor::Arm,
        "Imagination Technologies" => GlVendor::Imagination,
        v if v.starts_with("Intel ") || v == "Intel" => GlVendor::Intel,
        "Qualcomm" => GlVendor::Qualcomm,
        "NVIDIA Corporation" => GlVendor::Nvidia,
        _ => GlVendor::Other,
    }
}

pub fn parse_renderer(renderer: &str) -> GlRenderer {
    let renderer = renderer.trim();
    if renderer == "NVIDIA Tegra 3" {
        return GlRenderer::Tegra3;
    }
    if renderer == "NVIDIA Tegra" {
        return GlRenderer::Tegra2;
    }
    if let Some(model) = renderer.strip_prefix("PowerVR SGX 54") {
        if model.starts_with(|c: char| c.is_ascii_digit() || c == 'x') {
            return GlRenderer::PowerVR54x;
        }
    }
    if renderer.starts_with("PowerVR Rogue") {
        return GlRenderer::PowerVRRogue;
    }
    if let Some(model) = renderer.strip_prefix("Adreno (TM) ") {
        if let Some(series) = model.chars().next().and_then(|c| c.to_digit(10)) {
            return match series {
                3 => GlRenderer::Adreno3xx,
                4 => GlRenderer::Adreno4xx,
                _ => GlRenderer::Other,
            };
        }
    }
    GlRenderer::Other
}

pub fn parse_driver(
    vendor: GlVendor,
    renderer: &str,
    version: &str,
) -> (GlDriver, Option<GlVersion>) {
    if renderer.starts_with("Chromium") {
        return (GlDriver::Chromium, None);
    }
    if let Some(index) = version.find("Mesa ") {
        return (GlDriver::Mesa, parse_major_minor(&version[index + 5..]));
    }
    if vendor == GlVendor::Nvidia {
        let driver_version = version
            .split_whitespace()
            .skip_while(|token| *token != "NVIDIA")
            .nth(1)
            .and_then(parse_major_minor);
        return (GlDriver::Nvidia, driver_version);
    }
    (GlDriver::Other, None)
}

/// An in-memory interface reporting fixed strings, used for headless runs.
#[derive(Clone, Debug)]
pub struct StaticGlInterface {
    pub standard: GlStandard,
    pub version: Option<String>,
    pub glsl_version: Option<String>,
    pub vendor: Option<String>,
    pub renderer: Option<String>,
    pub max_texture_size: Option<u32>,
    pub valid: bool,
}

impl StaticGlInterface {
    /// A desktop Mesa software driver.
    pub fn headless() -> Self {
        Self {
            standard: GlStandard::Desktop,
            version: Some("4.5 (Core Profile) Mesa 23.1.4".to_string()),
            glsl_version: Some("4.50".to_string()),
            vendor: Some("Mesa".to_string()),
            renderer: Some("llvmpipe (LLVM 15.0.7, 256 bits)".to_string()),
            max_texture_size: Some(8192),
            valid: true,
        }
    }
}

impl GlInterface for StaticGlInterface {
    fn standard(&self) -> GlStandard {
        self.standard
    }

    fn has_get_string(&self) -> bool {
        self.version.is_some()
    }

    fn get_string(&self, name: GlString) -> Option<String> {
        match name {
            GlString::Version => self.version.clone(),
            GlString::ShadingLanguageVersion => self.glsl_version.clone(),
            GlString::Vendor => self.vendor.clone(),
            GlString::Renderer => self.renderer.clone(),
        }
    }

    fn max_texture_size(&self) -> Option<u32> {
        self.max_texture_size
    }

    fn validate(&self) -> bool {
        self.valid
    }
}
