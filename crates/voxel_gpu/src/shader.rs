//! Shader compilation and pipeline caching.
//!
//! Compilation and pipeline object creation sit behind [`ShaderCompiler`]
//! and [`PipelineFactory`]; the render graph only ever sees the resulting
//! [`PipelineHandle`]s. [`PipelineCache`] keys pipelines by entry point and
//! specialization constants so a variant is built once.
//!
//! On the host backend a "shader" is a Rust kernel registered by name in a
//! [`KernelLibrary`]; compiling checks that the entry point exists for the
//! requested stage.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::device::{ComputeKernel, PipelineHandle, VertexProgram};
use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
  Compute,
  Vertex,
}

/// Entry point to compile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderSource {
  pub name: String,
  pub stage: ShaderStage,
}

impl ShaderSource {
  pub fn compute(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      stage: ShaderStage::Compute,
    }
  }

  pub fn vertex(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      stage: ShaderStage::Vertex,
    }
  }
}

/// Compiled shader module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderModule {
  pub name: String,
  pub stage: ShaderStage,
}

/// Specialization constants, sorted by constant ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Specialization(SmallVec<[(u32, u32); 4]>);

impl Specialization {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set constant `id`, replacing any previous value.
  pub fn with(mut self, id: u32, value: u32) -> Self {
    match self.0.binary_search_by_key(&id, |(k, _)| *k) {
      Ok(i) => self.0[i].1 = value,
      Err(i) => self.0.insert(i, (id, value)),
    }
    self
  }

  pub fn get(&self, id: u32) -> Option<u32> {
    self
      .0
      .binary_search_by_key(&id, |(k, _)| *k)
      .ok()
      .map(|i| self.0[i].1)
  }
}

pub trait ShaderCompiler {
  fn compile(&self, source: &ShaderSource) -> Result<ShaderModule, PipelineError>;
}

pub trait PipelineFactory {
  fn create_compute_pipeline(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<PipelineHandle, PipelineError>;

  fn create_graphics_pipeline(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<PipelineHandle, PipelineError>;

  fn destroy_pipeline(&self, pipeline: PipelineHandle);
}

// =============================================================================
// Kernel library
// =============================================================================

type ComputeCtor =
  Box<dyn Fn(&Specialization) -> Result<Arc<dyn ComputeKernel>, String> + Send + Sync>;
type VertexCtor =
  Box<dyn Fn(&Specialization) -> Result<Arc<dyn VertexProgram>, String> + Send + Sync>;

/// Named kernel constructors backing the host compiler.
#[derive(Default)]
pub struct KernelLibrary {
  compute: HashMap<String, ComputeCtor>,
  vertex: HashMap<String, VertexCtor>,
}

impl KernelLibrary {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_compute<F>(&mut self, name: &str, ctor: F) -> &mut Self
  where
    F: Fn(&Specialization) -> Result<Arc<dyn ComputeKernel>, String> + Send + Sync + 'static,
  {
    self.compute.insert(name.to_string(), Box::new(ctor));
    self
  }

  pub fn register_vertex<F>(&mut self, name: &str, ctor: F) -> &mut Self
  where
    F: Fn(&Specialization) -> Result<Arc<dyn VertexProgram>, String> + Send + Sync + 'static,
  {
    self.vertex.insert(name.to_string(), Box::new(ctor));
    self
  }

  pub fn has_entry(&self, name: &str, stage: ShaderStage) -> bool {
    match stage {
      ShaderStage::Compute => self.compute.contains_key(name),
      ShaderStage::Vertex => self.vertex.contains_key(name),
    }
  }

  fn check_stage(module: &ShaderModule, expected: ShaderStage) -> Result<(), PipelineError> {
    if module.stage == expected {
      Ok(())
    } else {
      Err(PipelineError::WrongStage {
        name: module.name.clone(),
        expected,
        actual: module.stage,
      })
    }
  }

  pub fn instantiate_compute(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<Arc<dyn ComputeKernel>, PipelineError> {
    Self::check_stage(module, ShaderStage::Compute)?;
    let ctor = self
      .compute
      .get(&module.name)
      .ok_or_else(|| PipelineError::Creation {
        name: module.name.clone(),
        message: "no such compute entry point".into(),
      })?;
    ctor(specialization).map_err(|message| PipelineError::Creation {
      name: module.name.clone(),
      message,
    })
  }

  pub fn instantiate_vertex(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<Arc<dyn VertexProgram>, PipelineError> {
    Self::check_stage(module, ShaderStage::Vertex)?;
    let ctor = self
      .vertex
      .get(&module.name)
      .ok_or_else(|| PipelineError::Creation {
        name: module.name.clone(),
        message: "no such vertex entry point".into(),
      })?;
    ctor(specialization).map_err(|message| PipelineError::Creation {
      name: module.name.clone(),
      message,
    })
  }
}

/// Compiler for the host backend: resolves entry points in a [`KernelLibrary`].
#[derive(Clone)]
pub struct HostShaderCompiler {
  library: Arc<KernelLibrary>,
}

impl HostShaderCompiler {
  pub fn new(library: Arc<KernelLibrary>) -> Self {
    Self { library }
  }
}

impl ShaderCompiler for HostShaderCompiler {
  fn compile(&self, source: &ShaderSource) -> Result<ShaderModule, PipelineError> {
    if !self.library.has_entry(&source.name, source.stage) {
      return Err(PipelineError::Compilation {
        name: source.name.clone(),
        message: format!("no {:?} entry point named `{}`", source.stage, source.name),
      });
    }
    Ok(ShaderModule {
      name: source.name.clone(),
      stage: source.stage,
    })
  }
}

// =============================================================================
// Pipeline cache
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
  source: ShaderSource,
  specialization: Specialization,
}

/// Pipelines keyed by entry point and specialization.
#[derive(Default)]
pub struct PipelineCache {
  entries: HashMap<PipelineKey, PipelineHandle>,
  hits: u64,
  misses: u64,
}

impl PipelineCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the cached pipeline or compile and create it.
  pub fn get_or_create(
    &mut self,
    compiler: &dyn ShaderCompiler,
    factory: &dyn PipelineFactory,
    source: &ShaderSource,
    specialization: &Specialization,
  ) -> Result<PipelineHandle, PipelineError> {
    let key = PipelineKey {
      source: source.clone(),
      specialization: specialization.clone(),
    };
    if let Some(&handle) = self.entries.get(&key) {
      self.hits += 1;
      return Ok(handle);
    }

    let module = compiler.compile(source)?;
    let handle = match source.stage {
      ShaderStage::Compute => factory.create_compute_pipeline(&module, specialization)?,
      ShaderStage::Vertex => factory.create_graphics_pipeline(&module, specialization)?,
    };
    tracing::debug!(name = %source.name, ?specialization, ?handle, "created pipeline");
    self.misses += 1;
    self.entries.insert(key, handle);
    Ok(handle)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// `(hits, misses)` since creation.
  pub fn stats(&self) -> (u64, u64) {
    (self.hits, self.misses)
  }

  /// Destroy every cached pipeline.
  pub fn clear(&mut self, factory: &dyn PipelineFactory) {
    for (_, handle) in self.entries.drain() {
      factory.destroy_pipeline(handle);
    }
  }
}

#[cfg(test)]
#[path = "shader_test.rs"]
mod shader_test;
