/// Growable descriptor set allocator
///
/// Owns a set of descriptor pools split into `ready` (may still have room)
/// and `full` (reported exhausted). When no ready pool is left a new one is
/// created, each larger than the last by a factor of 1.5 up to
/// `max_sets_per_pool`. Pools are never freed individually: `clear_pools`
/// resets them all at once, `destroy_pools` releases them.

use crate::device::*;
use crate::error::{Error, ErrorKind, Result};

/// Default upper bound on sets per pool
pub const MAX_SETS_PER_POOL: u32 = 4092;

const GROWTH_FACTOR: f64 = 1.5;

pub struct DescriptorAllocator {
    ratios: Vec<PoolSizeRatio>,
    ready: Vec<DescriptorPoolHandle>,
    full: Vec<DescriptorPoolHandle>,
    initial_sets: u32,
    max_sets_per_pool: u32,
    growth_count: u32,
}

impl DescriptorAllocator {
    /// Create the allocator and its first pool of `capacity_hint` sets
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if `capacity_hint` is zero or `ratios`
    /// is empty; device errors from pool creation.
    pub fn new(
        device: &dyn GraphicsDevice,
        capacity_hint: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<Self> {
        Self::with_max_sets(device, capacity_hint, ratios, MAX_SETS_PER_POOL)
    }

    /// Like [`new`](Self::new) with an explicit per-pool cap
    pub fn with_max_sets(
        device: &dyn GraphicsDevice,
        capacity_hint: u32,
        ratios: &[PoolSizeRatio],
        max_sets_per_pool: u32,
    ) -> Result<Self> {
        if capacity_hint == 0 {
            crate::engine_error!("lumen::DescriptorAllocator", "Capacity hint must be non-zero");
            return Err(Error::InitializationFailed(
                "descriptor allocator capacity hint is zero".to_string(),
            ));
        }
        if ratios.is_empty() {
            crate::engine_error!("lumen::DescriptorAllocator", "No descriptor pool ratios given");
            return Err(Error::InitializationFailed(
                "descriptor allocator has no pool ratios".to_string(),
            ));
        }

        let mut allocator = Self {
            ratios: ratios.to_vec(),
            ready: Vec::new(),
            full: Vec::new(),
            initial_sets: capacity_hint,
            max_sets_per_pool,
            growth_count: 0,
        };
        let pool = allocator.create_pool(device, capacity_hint)?;
        allocator.ready.push(pool);

        crate::engine_debug!(
            "lumen::DescriptorAllocator",
            "Created with {} sets per pool ({} descriptor types)",
            capacity_hint,
            ratios.len()
        );
        Ok(allocator)
    }

    /// Allocate one set for `layout`
    ///
    /// An exhausted pool is retired to the `full` list and the allocation is
    /// retried once on a fresh pool. A second failure is fatal.
    pub fn allocate(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let pool = self.get_pool(device)?;
        let error = match device.allocate_descriptor_set(pool, layout) {
            Ok(set) => {
                self.ready.push(pool);
                return Ok(set);
            }
            Err(error) => error,
        };

        if error.kind() != ErrorKind::PoolExhausted {
            self.ready.push(pool);
            crate::engine_error!("lumen::DescriptorAllocator", "Descriptor set allocation failed: {}", error);
            return Err(error);
        }

        self.full.push(pool);
        let pool = self.get_pool(device)?;
        match device.allocate_descriptor_set(pool, layout) {
            Ok(set) => {
                self.ready.push(pool);
                Ok(set)
            }
            Err(error) => {
                if error.kind() == ErrorKind::PoolExhausted {
                    self.full.push(pool);
                } else {
                    self.ready.push(pool);
                }
                Err(crate::engine_err!(
                    "lumen::DescriptorAllocator",
                    "Descriptor set allocation failed on a fresh pool: {}",
                    error
                ))
            }
        }
    }

    /// Reset every pool and make them all ready again
    ///
    /// Sets previously handed out become invalid. Pool count is unchanged.
    pub fn clear_pools(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        for pool in self.ready.iter().chain(self.full.iter()) {
            device.reset_descriptor_pool(*pool)?;
        }
        self.ready.append(&mut self.full);
        Ok(())
    }

    /// Destroy every pool
    pub fn destroy_pools(&mut self, device: &dyn GraphicsDevice) {
        for pool in self.ready.drain(..).chain(self.full.drain(..)) {
            device.destroy_descriptor_pool(pool);
        }
    }

    /// Size of the next pool to be created: `min(floor(initial * 1.5^(K+1)), max)`
    pub fn next_pool_size(&self) -> u32 {
        self.grown_pool_size(self.growth_count + 1)
    }

    /// Pools created beyond the initial one
    pub fn growth_count(&self) -> u32 {
        self.growth_count
    }

    pub fn ready_pool_count(&self) -> usize {
        self.ready.len()
    }

    pub fn full_pool_count(&self) -> usize {
        self.full.len()
    }

    pub fn pool_count(&self) -> usize {
        self.ready.len() + self.full.len()
    }

    pub fn max_sets_per_pool(&self) -> u32 {
        self.max_sets_per_pool
    }

    fn grown_pool_size(&self, k: u32) -> u32 {
        let size = (self.initial_sets as f64 * GROWTH_FACTOR.powi(k as i32)).floor();
        if size >= self.max_sets_per_pool as f64 {
            self.max_sets_per_pool
        } else {
            size as u32
        }
    }

    fn get_pool(&mut self, device: &dyn GraphicsDevice) -> Result<DescriptorPoolHandle> {
        if let Some(pool) = self.ready.pop() {
            return Ok(pool);
        }
        let sets = self.next_pool_size();
        let pool = self.create_pool(device, sets)?;
        self.growth_count += 1;
        crate::engine_debug!(
            "lumen::DescriptorAllocator",
            "Grew to {} pools, new pool holds {} sets",
            self.pool_count() + 1,
            sets
        );
        Ok(pool)
    }

    fn create_pool(&self, device: &dyn GraphicsDevice, set_count: u32) -> Result<DescriptorPoolHandle> {
        let sizes: Vec<DescriptorPoolSize> = self
            .ratios
            .iter()
            .map(|ratio| DescriptorPoolSize {
                descriptor_type: ratio.descriptor_type,
                count: (ratio.ratio * set_count as f32) as u32,
            })
            .collect();
        device.create_descriptor_pool(set_count, &sizes)
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
