//! The VM heap: a mark-sweep-collected arena of [`Object`]s (spec.md §4.7).
//!
//! Objects are addressed by [`ObjectHandle`] (an arena index) rather than a
//! raw pointer; a singly-linked "next" list isn't needed once the objects
//! already live in one contiguous arena with a free list for reuse.
use crate::bytecode::value::ObjectHandle;
use crate::bytecode::Value;

#[derive(Debug, Clone)]
pub enum ObjectPayload {
    String(String),
    Array(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct Object {
    pub marked: bool,
    pub payload: ObjectPayload,
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Option<Object>>,
    free: Vec<ObjectHandle>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, payload: ObjectPayload) -> ObjectHandle {
        let object = Object { marked: false, payload };
        if let Some(handle) = self.free.pop() {
            self.objects[handle] = Some(object);
            handle
        } else {
            self.objects.push(Some(object));
            self.objects.len() - 1
        }
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&Object> {
        self.objects.get(handle).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut Object> {
        self.objects.get_mut(handle).and_then(|slot| slot.as_mut())
    }

    pub fn live_count(&self) -> usize {
        self.objects.iter().filter(|slot| slot.is_some()).count()
    }

    /// Mark-and-sweep: marks everything transitively reachable from `roots`
    /// (walking through array payloads), then frees every unmarked object.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) {
        for slot in self.objects.iter_mut().flatten() {
            slot.marked = false;
        }

        let mut worklist: Vec<ObjectHandle> = roots
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(handle) => Some(handle),
                _ => None,
            })
            .collect();

        while let Some(handle) = worklist.pop() {
            let mut children = vec![];
            if let Some(Some(object)) = self.objects.get_mut(handle) {
                if !object.marked {
                    object.marked = true;
                    if let ObjectPayload::Array(items) = &object.payload {
                        for item in items {
                            if let Value::Object(h) = item {
                                children.push(*h);
                            }
                        }
                    }
                }
            }
            worklist.extend(children);
        }

        for (handle, slot) in self.objects.iter_mut().enumerate() {
            let unreachable = matches!(slot, Some(obj) if !obj.marked);
            if unreachable {
                *slot = None;
                self.free.push(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_objects_are_freed_after_collect() {
        let mut heap = Heap::new();
        let keep = heap.allocate(ObjectPayload::String("keep".into()));
        let garbage = heap.allocate(ObjectPayload::String("garbage".into()));
        heap.collect([Value::Object(keep)]);
        assert!(heap.get(keep).is_some());
        assert!(heap.get(garbage).is_none());
    }

    #[test]
    fn arrays_keep_their_elements_reachable() {
        let mut heap = Heap::new();
        let inner = heap.allocate(ObjectPayload::String("nested".into()));
        let outer = heap.allocate(ObjectPayload::Array(vec![Value::Object(inner)]));
        heap.collect([Value::Object(outer)]);
        assert!(heap.get(inner).is_some());
    }

    #[test]
    fn freed_slots_are_reused_on_the_next_allocation() {
        let mut heap = Heap::new();
        let a = heap.allocate(ObjectPayload::String("a".into()));
        heap.collect([]);
        assert!(heap.get(a).is_none());
        let b = heap.allocate(ObjectPayload::String("b".into()));
        assert_eq!(a, b);
    }
}
