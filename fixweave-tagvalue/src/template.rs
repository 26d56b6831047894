/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Group-template registry.
//!
//! Repeating groups can only be nested when the decoder knows, for a given
//! message type, which count tag introduces a group and what its instances
//! look like. The registry keys templates by (message type, count tag).

use fixweave_core::fieldmap::GroupTemplate;
use fixweave_core::message::MsgType;
use std::collections::HashMap;

/// Registry of repeating-group templates keyed by message type.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<(MsgType, u32), GroupTemplate>,
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template for a message type, replacing any previous
    /// template for the same count tag.
    pub fn register(&mut self, msg_type: MsgType, template: GroupTemplate) {
        self.templates
            .insert((msg_type, template.count_tag()), template);
    }

    /// Looks up the template for a count tag within a message type.
    #[must_use]
    pub fn lookup(&self, msg_type: &MsgType, count_tag: u32) -> Option<&GroupTemplate> {
        self.templates.get(&(msg_type.clone(), count_tag))
    }

    /// Returns every template registered for a message type, keyed by count
    /// tag — the shape the message factory consumes.
    #[must_use]
    pub fn for_msg_type(&self, msg_type: &MsgType) -> HashMap<u32, GroupTemplate> {
        self.templates
            .iter()
            .filter(|((t, _), _)| t == msg_type)
            .map(|((_, count_tag), template)| (*count_tag, template.clone()))
            .collect()
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no templates are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
