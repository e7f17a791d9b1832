//! # World
//!
//! Entity rows, component storage and the pending lifecycle queues.
//!
//! A world goes through two phases. While it is being built, components are
//! registered and each one claims a region of the row. [`World::initialize`]
//! seals the layout: the presence bitset is prepended, offsets are shifted
//! past it and the entity table is created. From then on entities can be
//! spawned and components attached, but nothing new can be registered.
//!
//! Systems, managers and the tick itself live on [`Engine`](super::Engine),
//! which owns a world and lends it to every hook.

use bytemuck::Pod;

use super::component::{
    read_slot, write_slot, BagHeader, Backing, ComponentDesc, ComponentInfo, Storage,
};
use super::entity::{ComponentId, Entity};
use super::signal::{Signal, SignalQueue};
use super::table::EntityTable;
use crate::collections::{clear_bit, set_bit, test_bit, BitSet, SparseSet};
use crate::error::{EcsError, EcsResult};
use crate::memory::{Allocator, PoolStats, SlotIndex, SystemAllocator};

/// Where an element's bytes live once its presence has been checked.
#[derive(Clone, Copy)]
enum Location {
    Row { start: usize, len: usize },
    Pool(SlotIndex),
}

/// Entity and component storage.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentDesc, Storage, World};
///
/// let mut world = World::new();
/// let health = world
///     .create_component(ComponentDesc::of::<u32>("health", Storage::Inline))
///     .unwrap();
/// world.initialize().unwrap();
///
/// let entity = world.spawn().unwrap();
/// world.set(entity, health, &100u32).unwrap();
/// assert_eq!(world.read::<u32>(entity, health).unwrap(), 100);
/// ```
pub struct World {
    allocator: Box<dyn Allocator>,
    initialized: bool,
    /// Set for the duration of a tick; spawns are diverted to overflow.
    processing: bool,
    components: Vec<ComponentInfo>,
    /// Sum of every component's row region.
    region_width: usize,
    /// Size of the presence bitset at the start of each row.
    presence_bytes: usize,
    table: EntityTable,
    signals: SignalQueue,
    active: BitSet,
}

impl World {
    /// Creates an empty world backed by the system allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(SystemAllocator)
    }

    /// Creates an empty world that charges every allocation to `allocator`.
    #[must_use]
    pub fn with_allocator(allocator: impl Allocator + 'static) -> Self {
        Self {
            allocator: Box::new(allocator),
            initialized: false,
            processing: false,
            components: Vec::new(),
            region_width: 0,
            presence_bytes: 0,
            table: EntityTable::new(0),
            signals: SignalQueue::new(),
            active: BitSet::new(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a component type and returns its id.
    ///
    /// Ids are handed out in registration order, starting at zero.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyInitialized`] after [`World::initialize`]
    /// - [`EcsError::InvalidDescriptor`] for a capacity-limited inline component
    /// - an out-of-memory error if a limited pool cannot be preallocated
    pub fn create_component(&mut self, desc: ComponentDesc) -> EcsResult<ComponentId> {
        if self.initialized {
            return Err(EcsError::AlreadyInitialized);
        }
        let id = ComponentId::new(self.components.len() as u32);
        self.components.try_reserve(1)?;
        let info = ComponentInfo::new(id, desc, self.region_width, self.allocator.as_mut())?;
        self.region_width += info.row_bytes();
        self.components.push(info);
        Ok(id)
    }

    /// Seals the row layout and creates the entity table.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyInitialized`] if called twice.
    pub fn initialize(&mut self) -> EcsResult<()> {
        if self.initialized {
            return Err(EcsError::AlreadyInitialized);
        }
        self.presence_bytes = self.components.len().div_ceil(8);
        for info in &mut self.components {
            info.offset += self.presence_bytes;
        }
        self.table = EntityTable::new(self.presence_bytes + self.region_width);
        self.initialized = true;

        tracing::debug!(
            "World initialized: {} components, {}-byte rows",
            self.components.len(),
            self.table.row_width()
        );
        Ok(())
    }

    /// Preallocates room for `rows` entities.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotInitialized`] before initialization,
    /// [`EcsError::TickInProgress`] from inside a tick, or an out-of-memory
    /// error if the table cannot grow.
    pub fn reserve(&mut self, rows: u32) -> EcsResult<()> {
        self.ensure_initialized()?;
        if self.processing {
            return Err(EcsError::TickInProgress);
        }
        self.table.reserve(rows, self.allocator.as_mut())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns `true` once [`World::initialize`] has run.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns `true` while a tick or manual system run is in progress.
    #[inline]
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn registered_components(&self) -> usize {
        self.components.len()
    }

    /// Descriptor `component` was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] for an unknown id.
    pub fn component_desc(&self, component: ComponentId) -> EcsResult<&ComponentDesc> {
        self.info(component).map(|info| &info.desc)
    }

    /// Name `component` was registered under.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] for an unknown id.
    pub fn component_name(&self, component: ComponentId) -> EcsResult<&str> {
        self.info(component).map(|info| info.desc.name.as_str())
    }

    /// Looks a component up by name.
    #[must_use]
    pub fn find_component(&self, name: &str) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|info| info.desc.name == name)
            .map(|index| ComponentId::new(index as u32))
    }

    /// Occupancy of a pooled component's pool; `None` for inline components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] for an unknown id.
    pub fn pool_stats(&self, component: ComponentId) -> EcsResult<Option<PoolStats>> {
        self.info(component).map(|info| info.pool().map(|pool| pool.stats()))
    }

    /// The entity table.
    #[inline]
    #[must_use]
    pub const fn table(&self) -> &EntityTable {
        &self.table
    }

    /// Number of entity ids handed out so far, including freed ones.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> u32 {
        self.table.height()
    }

    /// Rows spawned during the current tick, waiting to be merged.
    #[inline]
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.table.overflow_len()
    }

    /// Pending lifecycle signals.
    #[inline]
    #[must_use]
    pub const fn signals(&self) -> &SignalQueue {
        &self.signals
    }

    /// Returns `true` if `entity`'s last drained enable has not been
    /// followed by a drained disable.
    #[must_use]
    pub fn is_active(&self, entity: Entity) -> bool {
        self.active.contains(entity.index())
    }

    /// Active entities in ascending id order.
    pub fn active_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.active.iter().map(Entity::new)
    }

    /// Presence bitset of `entity`'s row.
    pub(crate) fn presence(&self, entity: Entity) -> Option<&[u8]> {
        self.table
            .row(entity)
            .map(|row| &row[..self.presence_bytes])
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates an entity with no components.
    ///
    /// The entity is inert until an [`Signal::Added`] or [`Signal::Enabled`]
    /// for it is drained. Recently deleted ids are reused first.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotInitialized`] before initialization, or an
    /// out-of-memory error if the table cannot grow.
    pub fn spawn(&mut self) -> EcsResult<Entity> {
        self.ensure_initialized()?;
        self.table.spawn(self.processing, self.allocator.as_mut())
    }

    /// Queues a lifecycle transition for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotInitialized`] or [`EcsError::InvalidEntity`].
    pub fn signal(&mut self, entity: Entity, signal: Signal) -> EcsResult<()> {
        self.ensure_entity(entity)?;
        self.signals.push(entity, signal)
    }

    /// Queues a lifecycle transition given as a raw code.
    ///
    /// # Errors
    ///
    /// As [`World::signal`], plus [`EcsError::InvalidSignal`] for an
    /// unknown code.
    pub fn signal_raw(&mut self, entity: Entity, raw: u32) -> EcsResult<()> {
        self.ensure_entity(entity)?;
        self.signals.push(entity, Signal::try_from(raw)?)
    }

    /// Spawns a new entity carrying a copy of every component instance of
    /// `parent`.
    ///
    /// The copy is independent: pooled elements get slots of their own. If
    /// any copy fails, the half-built child is released again.
    ///
    /// # Errors
    ///
    /// - [`EcsError::NotInitialized`] or [`EcsError::InvalidEntity`]
    /// - [`EcsError::FullComponent`] if a limited pool runs out
    /// - an out-of-memory error
    pub fn clone_entity(&mut self, parent: Entity) -> EcsResult<Entity> {
        self.ensure_entity(parent)?;
        let child = self.spawn()?;
        if let Err(err) = self.copy_components(parent, child) {
            self.release_entity(child)?;
            return Err(err);
        }
        Ok(child)
    }

    fn copy_components(&mut self, parent: Entity, child: Entity) -> EcsResult<()> {
        let mut scratch = Vec::new();
        for index in 0..self.components.len() {
            let component = ComponentId::new(index as u32);
            for instance in 0..self.component_count(parent, component)? {
                scratch.clear();
                scratch.extend_from_slice(self.get_component_at(parent, component, instance)?);
                self.attach(child, component, instance, Some(&scratch))?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Component access (bytes)
    // =========================================================================

    /// Attaches `component` to `entity`, or overwrites it if present.
    ///
    /// `data` must match the registered size. With `None`, a new element is
    /// zeroed and an existing one is left untouched.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityActive`] if `entity` is active and does not carry
    ///   the component yet
    /// - [`EcsError::SizeMismatch`] if `data` has the wrong length
    /// - [`EcsError::FullComponent`] if a limited pool runs out
    pub fn set_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        data: Option<&[u8]>,
    ) -> EcsResult<()> {
        self.attach(entity, component, 0, data).map(drop)
    }

    /// Writes instance `index` of a multi-valued component.
    ///
    /// An index at or past the current count appends instead.
    ///
    /// # Returns
    ///
    /// The index actually written.
    ///
    /// # Errors
    ///
    /// As [`World::set_component`], plus [`EcsError::ComponentMissing`] for
    /// a non-zero index on a single-valued component.
    pub fn set_component_at(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: u32,
        data: Option<&[u8]>,
    ) -> EcsResult<u32> {
        self.attach(entity, component, index, data)
    }

    /// Appends an instance of a multi-valued component. For single-valued
    /// components this is [`World::set_component`].
    ///
    /// # Returns
    ///
    /// The index of the new instance.
    ///
    /// # Errors
    ///
    /// As [`World::set_component`].
    pub fn append_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        data: Option<&[u8]>,
    ) -> EcsResult<u32> {
        let index = match self.info(component)?.desc.storage {
            Storage::Multiple => self.component_count(entity, component)?,
            Storage::Inline | Storage::Indexed => 0,
        };
        self.attach(entity, component, index, data)
    }

    /// Bytes of `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if the entity does not carry it.
    pub fn get_component(&self, entity: Entity, component: ComponentId) -> EcsResult<&[u8]> {
        self.get_component_at(entity, component, 0)
    }

    /// Bytes of instance `index` of `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if the instance does not exist.
    pub fn get_component_at(
        &self,
        entity: Entity,
        component: ComponentId,
        index: u32,
    ) -> EcsResult<&[u8]> {
        let location = self.locate(entity, component, index)?;
        let info = &self.components[component.index() as usize];
        match (location, &info.backing) {
            (Location::Row { start, len }, _) => self
                .table
                .row(entity)
                .map(|row| &row[start..start + len])
                .ok_or(EcsError::InvalidEntity(entity)),
            (Location::Pool(slot), Backing::Indexed(pool) | Backing::Multiple { pool, .. }) => {
                Ok(pool.slot(slot))
            }
            (Location::Pool(_), Backing::Inline) => Err(missing(entity, component, index)),
        }
    }

    /// Mutable bytes of `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if the entity does not carry it.
    pub fn get_component_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> EcsResult<&mut [u8]> {
        self.get_component_at_mut(entity, component, 0)
    }

    /// Mutable bytes of instance `index` of `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if the instance does not exist.
    pub fn get_component_at_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: u32,
    ) -> EcsResult<&mut [u8]> {
        let location = self.locate(entity, component, index)?;
        let info = &mut self.components[component.index() as usize];
        match (location, &mut info.backing) {
            (Location::Row { start, len }, _) => self
                .table
                .row_mut(entity)
                .map(|row| &mut row[start..start + len])
                .ok_or(EcsError::InvalidEntity(entity)),
            (Location::Pool(slot), Backing::Indexed(pool) | Backing::Multiple { pool, .. }) => {
                Ok(pool.slot_mut(slot))
            }
            (Location::Pool(_), Backing::Inline) => Err(missing(entity, component, index)),
        }
    }

    /// Number of instances of `component` on `entity`: zero or one for
    /// single-valued components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] or [`EcsError::InvalidComponent`].
    pub fn component_count(&self, entity: Entity, component: ComponentId) -> EcsResult<u32> {
        self.ensure_entity(entity)?;
        let info = self.info(component)?;
        let row = self.row(entity)?;
        if !test_bit(row, component.index()) {
            return Ok(0);
        }
        Ok(match info.backing {
            Backing::Multiple { .. } => BagHeader::read(row, info.offset).count,
            Backing::Inline | Backing::Indexed(_) => 1,
        })
    }

    /// Checks whether `entity` carries at least one instance of `component`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] or [`EcsError::InvalidComponent`].
    pub fn has_component(&self, entity: Entity, component: ComponentId) -> EcsResult<bool> {
        self.ensure_entity(entity)?;
        self.info(component)?;
        Ok(test_bit(self.row(entity)?, component.index()))
    }

    /// Detaches `component` from `entity`. For a multi-valued component only
    /// the first instance is removed.
    ///
    /// Removing a component the entity does not carry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityActive`] if `entity` is active.
    pub fn remove_component(&mut self, entity: Entity, component: ComponentId) -> EcsResult<()> {
        self.remove_component_at(entity, component, 0)
    }

    /// Detaches instance `index` of `component`. Later instances of a
    /// multi-valued component shift down by one; the component is cleared
    /// from the presence bitset when its last instance goes.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityActive`] if `entity` is active
    /// - [`EcsError::ComponentMissing`] if `index` is out of range for a
    ///   component the entity carries
    pub fn remove_component_at(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: u32,
    ) -> EcsResult<()> {
        self.ensure_detachable(entity, component)?;
        let Self {
            table,
            components,
            allocator,
            ..
        } = self;
        let row = table
            .row_mut(entity)
            .ok_or(EcsError::InvalidEntity(entity))?;
        let info = &mut components[component.index() as usize];
        if !test_bit(row, component.index()) {
            return Ok(());
        }

        let offset = info.offset;
        let Backing::Multiple { pool, bags } = &mut info.backing else {
            if index != 0 {
                return Err(missing(entity, component, index));
            }
            return release_component(row, info, component.index(), allocator.as_mut());
        };

        let mut header = BagHeader::read(row, offset);
        if index >= header.count {
            return Err(missing(entity, component, index));
        }
        let bag = header.handle();
        pool.release(SlotIndex::new(bags.get(bag)[index as usize]))?;
        bags.remove(bag, index as usize, allocator.as_mut());
        header.count -= 1;
        if header.count == 0 {
            bags.close(bag, allocator.as_mut())?;
            header = BagHeader::default();
            clear_bit(row, component.index());
        }
        header.write(row, offset);
        Ok(())
    }

    /// Detaches every instance of `component` from `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityActive`] if `entity` is active.
    pub fn remove_components(&mut self, entity: Entity, component: ComponentId) -> EcsResult<()> {
        self.ensure_detachable(entity, component)?;
        let Self {
            table,
            components,
            allocator,
            ..
        } = self;
        let row = table
            .row_mut(entity)
            .ok_or(EcsError::InvalidEntity(entity))?;
        release_component(
            row,
            &mut components[component.index() as usize],
            component.index(),
            allocator.as_mut(),
        )
    }

    // =========================================================================
    // Component access (typed)
    // =========================================================================

    /// Attaches or overwrites `component` with `value`.
    ///
    /// # Errors
    ///
    /// As [`World::set_component`].
    pub fn set<T: Pod>(&mut self, entity: Entity, component: ComponentId, value: &T) -> EcsResult<()> {
        self.set_component(entity, component, Some(bytemuck::bytes_of(value)))
    }

    /// Appends `value` as a new instance of `component`.
    ///
    /// # Errors
    ///
    /// As [`World::append_component`].
    pub fn append<T: Pod>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        value: &T,
    ) -> EcsResult<u32> {
        self.append_component(entity, component, Some(bytemuck::bytes_of(value)))
    }

    /// Reads `component` as a `T`.
    ///
    /// # Errors
    ///
    /// As [`World::get_component`], plus [`EcsError::SizeMismatch`].
    pub fn read<T: Pod>(&self, entity: Entity, component: ComponentId) -> EcsResult<T> {
        self.read_at(entity, component, 0)
    }

    /// Reads instance `index` of `component` as a `T`.
    ///
    /// # Errors
    ///
    /// As [`World::get_component_at`], plus [`EcsError::SizeMismatch`].
    pub fn read_at<T: Pod>(
        &self,
        entity: Entity,
        component: ComponentId,
        index: u32,
    ) -> EcsResult<T> {
        let bytes = self.get_component_at(entity, component, index)?;
        check_size::<T>(component, bytes.len())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Modifies `component` in place through `f`.
    ///
    /// # Errors
    ///
    /// As [`World::get_component_mut`], plus [`EcsError::SizeMismatch`].
    pub fn update<T: Pod, R>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        f: impl FnOnce(&mut T) -> R,
    ) -> EcsResult<R> {
        let bytes = self.get_component_mut(entity, component)?;
        check_size::<T>(component, bytes.len())?;
        let mut value: T = bytemuck::pod_read_unaligned(bytes);
        let result = f(&mut value);
        bytes.copy_from_slice(bytemuck::bytes_of(&value));
        Ok(result)
    }

    // =========================================================================
    // Tick plumbing
    // =========================================================================

    pub(crate) fn ensure_initialized(&self) -> EcsResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(EcsError::NotInitialized)
        }
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    /// Merges rows spawned during the tick into the main table.
    pub(crate) fn finalize(&mut self) -> EcsResult<usize> {
        self.table.finalize(self.allocator.as_mut())
    }

    pub(crate) fn take_signals(&mut self, signal: Signal) -> SparseSet {
        self.signals.take(signal)
    }

    pub(crate) fn restore_signals(&mut self, signal: Signal, drained: SparseSet) {
        self.signals.restore(signal, drained);
    }

    pub(crate) fn activate(&mut self, entity: Entity) -> EcsResult<()> {
        self.active.insert(entity.index()).map(drop)
    }

    pub(crate) fn deactivate(&mut self, entity: Entity) {
        self.active.remove(entity.index());
    }

    /// Releases every component of `entity`, zeroes its row and recycles
    /// its id.
    pub(crate) fn release_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let Self {
            table,
            components,
            allocator,
            ..
        } = self;
        if let Some(row) = table.row_mut(entity) {
            for (bit, info) in components.iter_mut().enumerate() {
                release_component(row, info, bit as u32, allocator.as_mut())?;
            }
        }
        table.release(entity)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_entity(&self, entity: Entity) -> EcsResult<()> {
        self.ensure_initialized()?;
        if self.table.contains(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    fn ensure_detachable(&self, entity: Entity, component: ComponentId) -> EcsResult<()> {
        self.ensure_entity(entity)?;
        self.info(component)?;
        if self.is_active(entity) {
            return Err(EcsError::EntityActive { entity, component });
        }
        Ok(())
    }

    fn info(&self, component: ComponentId) -> EcsResult<&ComponentInfo> {
        self.components
            .get(component.index() as usize)
            .ok_or(EcsError::InvalidComponent(component))
    }

    fn row(&self, entity: Entity) -> EcsResult<&[u8]> {
        self.table
            .row(entity)
            .ok_or(EcsError::InvalidEntity(entity))
    }

    fn locate(&self, entity: Entity, component: ComponentId, index: u32) -> EcsResult<Location> {
        self.ensure_entity(entity)?;
        let info = self.info(component)?;
        let row = self.row(entity)?;
        if !test_bit(row, component.index()) {
            return Err(missing(entity, component, index));
        }
        match &info.backing {
            Backing::Inline if index == 0 => Ok(Location::Row {
                start: info.offset,
                len: info.desc.size,
            }),
            Backing::Indexed(_) if index == 0 => Ok(Location::Pool(read_slot(row, info.offset))),
            Backing::Multiple { bags, .. } => {
                let header = BagHeader::read(row, info.offset);
                if index < header.count {
                    Ok(Location::Pool(SlotIndex::new(
                        bags.get(header.handle())[index as usize],
                    )))
                } else {
                    Err(missing(entity, component, index))
                }
            }
            Backing::Inline | Backing::Indexed(_) => Err(missing(entity, component, index)),
        }
    }

    /// Writes instance `index`, attaching it first if needed.
    fn attach(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: u32,
        data: Option<&[u8]>,
    ) -> EcsResult<u32> {
        self.ensure_entity(entity)?;
        let expected = self.info(component)?.desc.size;
        if let Some(bytes) = data {
            if bytes.len() != expected {
                return Err(EcsError::SizeMismatch {
                    component,
                    expected,
                    actual: bytes.len(),
                });
            }
        }
        let active = self.is_active(entity);

        let Self {
            table,
            components,
            allocator,
            ..
        } = self;
        let row = table
            .row_mut(entity)
            .ok_or(EcsError::InvalidEntity(entity))?;
        let info = &mut components[component.index() as usize];
        let bit = component.index();
        let present = test_bit(row, bit);
        if active && !present {
            return Err(EcsError::EntityActive { entity, component });
        }

        let offset = info.offset;
        match &mut info.backing {
            Backing::Inline | Backing::Indexed(_) if index != 0 => {
                Err(missing(entity, component, index))
            }
            Backing::Inline => {
                let region = &mut row[offset..offset + expected];
                match data {
                    Some(bytes) => region.copy_from_slice(bytes),
                    None if !present => region.fill(0),
                    None => {}
                }
                set_bit(row, bit);
                Ok(0)
            }
            Backing::Indexed(pool) => {
                let slot = if present {
                    read_slot(row, offset)
                } else {
                    let slot = pool.acquire(allocator.as_mut())?;
                    write_slot(row, offset, slot);
                    set_bit(row, bit);
                    slot
                };
                if let Some(bytes) = data {
                    pool.slot_mut(slot).copy_from_slice(bytes);
                }
                Ok(0)
            }
            Backing::Multiple { pool, bags } => {
                let mut header = BagHeader::read(row, offset);
                if index < header.count {
                    let slot = SlotIndex::new(bags.get(header.handle())[index as usize]);
                    if let Some(bytes) = data {
                        pool.slot_mut(slot).copy_from_slice(bytes);
                    }
                    return Ok(index);
                }

                let slot = pool.acquire(allocator.as_mut())?;
                let opened = header.handle().is_none();
                let bag = if opened {
                    match bags.open() {
                        Ok(bag) => bag,
                        Err(err) => {
                            pool.release(slot)?;
                            return Err(err);
                        }
                    }
                } else {
                    header.handle()
                };
                if let Err(err) = bags.push(bag, slot, allocator.as_mut()) {
                    pool.release(slot)?;
                    if opened {
                        bags.close(bag, allocator.as_mut())?;
                    }
                    return Err(err);
                }
                if let Some(bytes) = data {
                    pool.slot_mut(slot).copy_from_slice(bytes);
                }

                header.count += 1;
                header.bag = bag.raw();
                header.write(row, offset);
                set_bit(row, bit);
                Ok(header.count - 1)
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        let charged = self.table.charged_bytes()
            + self
                .components
                .iter()
                .map(ComponentInfo::charged_bytes)
                .sum::<usize>();
        self.allocator.release(charged);
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("initialized", &self.initialized)
            .field("processing", &self.processing)
            .field("components", &self.components.len())
            .field("entities", &self.table.height())
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

/// Releases every instance of a component from a row and clears its bit.
fn release_component(
    row: &mut [u8],
    info: &mut ComponentInfo,
    bit: u32,
    allocator: &mut dyn Allocator,
) -> EcsResult<()> {
    if !test_bit(row, bit) {
        return Ok(());
    }
    let offset = info.offset;
    match &mut info.backing {
        Backing::Inline => row[offset..offset + info.desc.size].fill(0),
        Backing::Indexed(pool) => {
            pool.release(read_slot(row, offset))?;
            write_slot(row, offset, SlotIndex::new(0));
        }
        Backing::Multiple { pool, bags } => {
            let header = BagHeader::read(row, offset);
            if !header.handle().is_none() {
                for slot in bags.close(header.handle(), allocator)? {
                    pool.release(SlotIndex::new(slot))?;
                }
            }
            BagHeader::default().write(row, offset);
        }
    }
    clear_bit(row, bit);
    Ok(())
}

fn check_size<T: Pod>(component: ComponentId, registered: usize) -> EcsResult<()> {
    let actual = std::mem::size_of::<T>();
    if actual == registered {
        Ok(())
    } else {
        Err(EcsError::SizeMismatch {
            component,
            expected: registered,
            actual,
        })
    }
}

#[inline]
const fn missing(entity: Entity, component: ComponentId, index: u32) -> EcsError {
    EcsError::ComponentMissing {
        entity,
        component,
        index,
    }
}
