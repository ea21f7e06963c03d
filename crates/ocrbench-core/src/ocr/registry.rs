//! Engine name to adapter resolution.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;

use super::{EngineKind, Extractor, SubprocessExtractor, UnavailableExtractor};
use crate::models::config::{BenchConfig, SubprocessEngineConfig};

type Factory = Box<dyn Fn() -> Box<dyn Extractor>>;

/// Registry of engine adapters owned by a benchmark run.
///
/// Factories are resolved up front; instances are created on first `get`
/// and cached until `reset`.
pub struct EngineRegistry {
    factories: IndexMap<String, Factory>,
    instances: HashMap<String, Box<dyn Extractor>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// An empty registry. Every name resolves to an unavailable adapter.
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Registry with factories for the four benchmarked engines.
    pub fn from_config(config: &BenchConfig) -> Self {
        let mut registry = Self::new();
        let timeout = config.engines.inference_timeout_secs.map(Duration::from_secs);
        let dpi = config.pdf.render_dpi;

        for kind in EngineKind::ALL {
            let factory: Factory = match kind {
                EngineKind::PaddleOcr => paddle_factory(config),
                EngineKind::Doctr => subprocess_factory(kind, config.engines.doctr.clone(), timeout, dpi),
                EngineKind::GotOcr2 => subprocess_factory(kind, config.engines.got_ocr2.clone(), timeout, dpi),
                EngineKind::SmolVlm => subprocess_factory(kind, config.engines.smolvlm.clone(), timeout, dpi),
            };
            registry.factories.insert(kind.as_str().to_string(), factory);
        }

        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Extractor> + 'static,
    {
        let name = canonical_name(&name.into());
        self.instances.remove(&name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Register a ready-made adapter under `name`.
    ///
    /// The instance survives until `reset`; afterwards `name` resolves to
    /// an unavailable adapter unless a factory is also registered.
    pub fn register(&mut self, name: impl Into<String>, extractor: Box<dyn Extractor>) {
        self.instances.insert(canonical_name(&name.into()), extractor);
    }

    /// Adapter for `name`, created on first use.
    pub fn get(&mut self, name: &str) -> &mut Box<dyn Extractor> {
        let name = canonical_name(name);
        let factories = &self.factories;
        self.instances.entry(name).or_insert_with_key(|name| match factories.get(name) {
            Some(factory) => {
                debug!("Instantiating adapter for {}", name);
                factory()
            }
            None => Box::new(UnavailableExtractor::new(
                name.clone(),
                format!("unknown engine '{}'", name),
            )),
        })
    }

    /// Whether `name` has a cached instance whose model is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.instances
            .get(&canonical_name(name))
            .is_some_and(|extractor| extractor.is_loaded())
    }

    /// Names with a factory, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Drop every cached instance; loaded models and helpers are released.
    pub fn reset(&mut self) {
        self.instances.clear();
    }
}

/// Known engine names are normalised ("PaddleOCR" and "paddleocr" share an
/// entry); anything else is kept verbatim.
pub(crate) fn canonical_name(name: &str) -> String {
    name.parse::<EngineKind>()
        .map(|kind| kind.as_str().to_string())
        .unwrap_or_else(|_| name.to_string())
}

#[cfg(feature = "native")]
fn paddle_factory(config: &BenchConfig) -> Factory {
    let paddle = config.engines.paddleocr.clone();
    let dpi = config.pdf.render_dpi;
    Box::new(move || -> Box<dyn Extractor> {
        Box::new(super::PaddleExtractor::new(paddle.clone(), dpi))
    })
}

#[cfg(not(feature = "native"))]
fn paddle_factory(_config: &BenchConfig) -> Factory {
    Box::new(|| -> Box<dyn Extractor> {
        Box::new(UnavailableExtractor::new(
            EngineKind::PaddleOcr.as_str(),
            "built without the native PaddleOCR engine",
        ))
    })
}

fn subprocess_factory(
    kind: EngineKind,
    engine: SubprocessEngineConfig,
    timeout: Option<Duration>,
    render_dpi: u32,
) -> Factory {
    Box::new(move || -> Box<dyn Extractor> {
        if engine.command.is_none() {
            return Box::new(UnavailableExtractor::new(
                kind.as_str(),
                format!("no command configured for engines.{}", kind.as_str()),
            ));
        }
        Box::new(SubprocessExtractor::new(kind.as_str(), engine.clone(), timeout, render_dpi))
    })
}
