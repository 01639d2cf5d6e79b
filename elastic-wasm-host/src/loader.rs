//! Guest module host using wasmtime
//!
//! Compiles a guest binary, links the `elastic` capability surface, and
//! drives the single `process` call.
//!
//! ```text
//! ModuleHost ──compile──► CompiledModule ──instantiate──► GuestInstance
//!                                                              │
//!                                                           process
//!                                                              ├──► Completion
//!                                                              └──► HostError
//! ```
//!
//! Each step consumes or borrows the previous one, so an instance can only
//! move forward: a failed or finished instance is gone, and a retry needs a
//! fresh `instantiate`.

use crate::capability;
use crate::context::{GuestExports, HostContext, HostState};
use crate::error::HostError;
use crate::record::Record;
use elastic_wasm_api::{abi, ABI_VERSION};
use wasmtime::*;

/// Default maximum WASM stack size (1MB)
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 1024;

/// Configuration for the module host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Fuel budget for one instance (instantiation plus `process`).
    /// `None` disables fuel metering.
    pub fuel_limit: Option<u64>,

    /// Maximum WASM stack size in bytes
    pub max_stack_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fuel_limit: None,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
        }
    }
}

impl HostConfig {
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = bytes;
        self
    }
}

/// Owns the wasmtime engine guests are compiled with
pub struct ModuleHost {
    engine: Engine,
    config: HostConfig,
}

/// A validated guest module; may be instantiated any number of times
pub struct CompiledModule {
    engine: Engine,
    module: Module,
    fuel_limit: Option<u64>,
}

/// One running incarnation of a guest module
pub struct GuestInstance<R> {
    store: Store<HostState<R>>,
    process_fn: TypedFunc<(), i32>,
}

/// Result of a finished `process` call
#[derive(Debug)]
pub struct Completion<R> {
    /// The guest's own return code, not interpreted by the host
    pub return_code: i32,

    /// The record after every `elastic_put_field` was applied
    pub record: R,
}

impl ModuleHost {
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        let mut engine_config = Config::new();

        engine_config.consume_fuel(config.fuel_limit.is_some());
        engine_config.max_wasm_stack(config.max_stack_size);

        // Guests are wasm32
        engine_config.wasm_memory64(false);

        let engine = Engine::new(&engine_config).map_err(HostError::EngineCreation)?;

        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Compile and validate a guest binary
    pub fn compile(&self, wasm_bytes: &[u8]) -> Result<CompiledModule, HostError> {
        tracing::debug!(size = wasm_bytes.len(), "Compiling guest module");
        let module = Module::new(&self.engine, wasm_bytes).map_err(HostError::Compilation)?;

        Ok(CompiledModule {
            engine: self.engine.clone(),
            module,
            fuel_limit: self.config.fuel_limit,
        })
    }
}

impl CompiledModule {
    /// Link the capability surface and create a fresh instance.
    ///
    /// Fails when the guest imports something other than the `elastic`
    /// functions, or lacks `memory`, `malloc` or `process`.
    pub fn instantiate<R: Record>(
        &self,
        ctx: HostContext<R>,
    ) -> Result<GuestInstance<R>, HostError> {
        let mut store = Store::new(&self.engine, HostState::new(ctx));
        if let Some(fuel) = self.fuel_limit {
            store.set_fuel(fuel).map_err(HostError::EngineCreation)?;
        }

        let mut linker = Linker::new(&self.engine);
        capability::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| match classify_trap(&e) {
                Some(err) => err,
                None => HostError::Instantiation(e),
            })?;

        let memory = instance
            .get_memory(&mut store, abi::EXPORT_MEMORY)
            .ok_or(HostError::MissingExport(abi::EXPORT_MEMORY))?;
        let malloc = typed_export::<i32, i32, R>(&instance, &mut store, abi::EXPORT_MALLOC)?;
        let process_fn = typed_export::<(), i32, R>(&instance, &mut store, abi::EXPORT_PROCESS)?;

        store.data_mut().exports = Some(GuestExports { memory, malloc });
        tracing::debug!(
            abi_version = ABI_VERSION,
            memory_size = memory.data_size(&store),
            "Guest instantiated"
        );

        Ok(GuestInstance { store, process_fn })
    }
}

impl<R: Record> GuestInstance<R> {
    /// Run the guest's `process` entry point. Consumes the instance.
    pub fn process(mut self) -> Result<Completion<R>, HostError> {
        let return_code = self
            .process_fn
            .call(&mut self.store, ())
            .map_err(|e| match classify_trap(&e) {
                Some(err) => err,
                None => HostError::Invocation {
                    function: abi::EXPORT_PROCESS,
                    source: e,
                },
            })?;

        if let Ok(remaining) = self.store.get_fuel() {
            tracing::debug!(remaining_fuel = remaining, "Guest finished");
        }

        let state = self.store.into_data();
        Ok(Completion {
            return_code,
            record: state.record,
        })
    }

    /// The record as the guest currently sees it
    pub fn record(&self) -> &R {
        self.store.data().record()
    }

    /// Current size of the guest's linear memory in bytes
    pub fn memory_size(&self) -> usize {
        self.store
            .data()
            .exports
            .as_ref()
            .map(|exports| exports.memory.data_size(&self.store))
            .unwrap_or_default()
    }
}

fn typed_export<P, Res, R>(
    instance: &Instance,
    store: &mut Store<HostState<R>>,
    name: &'static str,
) -> Result<TypedFunc<P, Res>, HostError>
where
    P: WasmParams,
    Res: WasmResults,
    R: Record,
{
    let func = instance
        .get_func(&mut *store, name)
        .ok_or(HostError::MissingExport(name))?;
    func.typed::<P, Res>(&*store)
        .map_err(|source| HostError::IncompatibleExport { name, source })
}

fn classify_trap(err: &anyhow::Error) -> Option<HostError> {
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => Some(HostError::FuelExhausted),
        _ => None,
    }
}
