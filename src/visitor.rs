use crate::blocks::{
    AttributeBlock, AttributeReferenceBlock, BacklinkBlock, Block, BlockGraph, ControlBlock,
    ControlKind, InputBlock, ListBlock, LiteralBlock, ProfileBlock, QuerySource, RecordBlock,
};

/// The BlockVisitor trait is the single traversal mechanism for block graphs
/// used by analysis passes.
///
/// Rules:
/// 1. Traversal order is document order: stacks, then slots in declaration order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call the matching `walk_*` function to continue
///    traversal unless pruning is intended.
///
/// Code generation and native lowering reduce the graph with their own
/// exhaustive matches because they return a value per block.
pub trait BlockVisitor {
    fn visit_graph(&mut self, graph: &BlockGraph) {
        walk_graph(self, graph);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_record(&mut self, record: &RecordBlock) {
        walk_record(self, record);
    }

    fn visit_attribute(&mut self, attribute: &AttributeBlock) {
        walk_attribute(self, attribute);
    }

    fn visit_profile(&mut self, profile: &ProfileBlock) {
        walk_profile(self, profile);
    }

    fn visit_input(&mut self, input: &InputBlock) {
        walk_input(self, input);
    }

    fn visit_control(&mut self, control: &ControlBlock) {
        walk_control(self, control);
    }

    fn visit_backlink(&mut self, backlink: &BacklinkBlock) {
        walk_backlink(self, backlink);
    }

    fn visit_attribute_reference(&mut self, _reference: &AttributeReferenceBlock) {
        // Leaf
    }

    fn visit_literal(&mut self, _literal: &LiteralBlock) {
        // Leaf
    }

    fn visit_list(&mut self, list: &ListBlock) {
        walk_list(self, list);
    }
}

pub fn walk_graph<V: BlockVisitor + ?Sized>(visitor: &mut V, graph: &BlockGraph) {
    for block in graph.top_level() {
        visitor.visit_block(block);
    }
}

pub fn walk_block<V: BlockVisitor + ?Sized>(visitor: &mut V, block: &Block) {
    match block {
        Block::Record(b) => visitor.visit_record(b),
        Block::Attribute(b) => visitor.visit_attribute(b),
        Block::Profile(b) => visitor.visit_profile(b),
        Block::Input(b) => visitor.visit_input(b),
        Block::Control(b) => visitor.visit_control(b),
        Block::Backlink(b) => visitor.visit_backlink(b),
        Block::AttributeReference(b) => visitor.visit_attribute_reference(b),
        Block::Literal(b) => visitor.visit_literal(b),
        Block::List(b) => visitor.visit_list(b),
    }
}

fn walk_slot<V: BlockVisitor + ?Sized>(visitor: &mut V, slot: Option<&Block>) {
    if let Some(block) = slot {
        visitor.visit_block(block);
    }
}

pub fn walk_record<V: BlockVisitor + ?Sized>(visitor: &mut V, record: &RecordBlock) {
    walk_slot(visitor, record.local_id.as_deref());
    walk_slot(visitor, record.skip_condition.as_deref());
    for statement in &record.body {
        visitor.visit_block(statement);
    }
}

pub fn walk_attribute<V: BlockVisitor + ?Sized>(visitor: &mut V, attribute: &AttributeBlock) {
    walk_slot(visitor, attribute.key.as_deref());
    walk_slot(visitor, attribute.value.as_deref());
}

pub fn walk_profile<V: BlockVisitor + ?Sized>(visitor: &mut V, profile: &ProfileBlock) {
    for input in &profile.inputs {
        visitor.visit_block(&input.value);
    }
}

pub fn walk_input<V: BlockVisitor + ?Sized>(visitor: &mut V, input: &InputBlock) {
    if let QuerySource::Slot(slot) = &input.query {
        walk_slot(visitor, slot.as_deref());
    }
}

pub fn walk_control<V: BlockVisitor + ?Sized>(visitor: &mut V, control: &ControlBlock) {
    match &control.kind {
        ControlKind::Stop { message } => walk_slot(visitor, message.as_deref()),
        ControlKind::Log { value, .. } => walk_slot(visitor, value.as_deref()),
        ControlKind::Otherwise { value, other } => {
            walk_slot(visitor, value.as_deref());
            walk_slot(visitor, other.as_deref());
        }
    }
}

pub fn walk_backlink<V: BlockVisitor + ?Sized>(visitor: &mut V, backlink: &BacklinkBlock) {
    walk_slot(visitor, backlink.attribute_key.as_deref());
}

pub fn walk_list<V: BlockVisitor + ?Sized>(visitor: &mut V, list: &ListBlock) {
    for item in &list.items {
        visitor.visit_block(item);
    }
}
