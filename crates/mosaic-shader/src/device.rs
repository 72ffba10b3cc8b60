use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::cache::{content_hash, ShaderCacheStats, ShaderModuleCache};
use crate::config::ShaderModuleConfig;
use crate::error::ShaderModuleError;
use crate::ir_validator::validate_spirv;
use crate::module::{
    validate_descriptor, CompilationInfo, ShaderModule, ShaderModuleDescriptor, ShaderSource,
    ShaderSourceKind, ValidModuleParts,
};
use crate::translate;

/// Creates shader modules and owns the cache that deduplicates them.
///
/// Cloning is cheap; clones share the cache.
#[derive(Debug, Clone, Default)]
pub struct Device {
    config: ShaderModuleConfig,
    cache: Arc<Mutex<ShaderModuleCache>>,
}

impl Device {
    pub fn new(config: ShaderModuleConfig) -> Self {
        Self {
            config,
            cache: Arc::default(),
        }
    }

    pub fn config(&self) -> &ShaderModuleConfig {
        &self.config
    }

    /// Validates the descriptor, translates WGSL, and returns the cached module with identical
    /// SPIR-V if one is still alive.
    pub fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<Arc<ShaderModule>, ShaderModuleError> {
        let (source_kind, wgsl, spirv, compilation_info) = match validate_descriptor(descriptor)? {
            ShaderSource::Spirv(code) => {
                let info = if self.config.validate_on_create {
                    CompilationInfo::from_report(&validate_spirv(code)?)
                } else {
                    CompilationInfo::default()
                };
                (ShaderSourceKind::Spirv, None, code.to_vec(), info)
            }
            ShaderSource::Wgsl(source) => {
                let words = translate::translate(source, &self.config.translate_options())?;
                (
                    ShaderSourceKind::Wgsl,
                    Some(source.to_owned()),
                    words,
                    CompilationInfo::default(),
                )
            }
        };

        let hash = content_hash(&spirv);
        let mut cache = self.lock_cache();
        let lookup = cache.lookup(hash, &spirv);
        if let Some(module) = lookup.hit {
            drop(cache);
            if let Some(source) = wgsl {
                module.attach_wgsl(source);
            }
            debug!(
                label = ?descriptor.label,
                %source_kind,
                "reusing cached shader module"
            );
            return Ok(module);
        }

        let module = Arc::new(ShaderModule::new_valid(
            descriptor.label.clone(),
            ValidModuleParts {
                source_kind,
                wgsl,
                spirv,
                content_hash: hash,
                reflection_backend: self.config.reflection_backend,
                translate_options: self.config.translate_options(),
                compilation_info,
            },
            Arc::downgrade(&self.cache),
        ));
        cache.insert(hash, &module);
        drop(cache);
        drop(lookup.upgraded);
        debug!(
            label = ?descriptor.label,
            %source_kind,
            hash,
            "created shader module"
        );
        Ok(module)
    }

    /// Placeholder for a failed creation. It is never cached, and querying its reflection
    /// data panics.
    pub fn create_error_shader_module(
        &self,
        label: Option<String>,
        reason: impl Into<String>,
    ) -> Arc<ShaderModule> {
        Arc::new(ShaderModule::new_error(label, reason.into()))
    }

    /// Like [`Device::create_shader_module`], but turns a failure into an error module.
    pub fn create_shader_module_or_error(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Arc<ShaderModule> {
        match self.create_shader_module(descriptor) {
            Ok(module) => module,
            Err(err) => {
                warn!(label = ?descriptor.label, error = %err, "shader module creation failed");
                self.create_error_shader_module(descriptor.label.clone(), err.to_string())
            }
        }
    }

    pub fn cache_stats(&self) -> ShaderCacheStats {
        self.lock_cache().stats()
    }

    /// Number of live modules in the cache.
    pub fn cached_module_count(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ShaderModuleCache> {
        self.cache.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}
