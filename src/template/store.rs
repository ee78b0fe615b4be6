//! Template storage with CRUD operations

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use super::renderer::Renderer;
use super::types::{
    RenderOptions, RenderedTemplate, StoredTemplate, TemplateError, TemplateResult,
    UpdateTemplateRequest,
};

/// In-memory template storage
pub struct TemplateStore {
    templates: DashMap<String, StoredTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create a new template store
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Create a new template
    pub fn create(&self, template: StoredTemplate) -> TemplateResult<StoredTemplate> {
        template.validate()?;

        match self.templates.entry(template.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TemplateError::AlreadyExists(template.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(template.clone());
                Ok(template)
            }
        }
    }

    /// Get a template by ID
    pub fn get(&self, id: &str) -> TemplateResult<StoredTemplate> {
        self.templates
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// List all templates
    pub fn list(&self) -> Vec<StoredTemplate> {
        self.templates
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Update an existing template
    pub fn update(
        &self,
        id: &str,
        updates: UpdateTemplateRequest,
    ) -> TemplateResult<StoredTemplate> {
        let mut template = self.get(id)?;

        if let Some(name) = updates.name {
            template.name = name;
        }

        if let Some(description) = updates.description {
            template.description = description;
        }

        if let Some(title) = updates.title {
            template.template.title = title;
        }

        if let Some(content) = updates.content {
            template.template.content = content;
        }

        if let Some(link) = updates.link {
            template.template.link = link;
        }

        template.updated_at = Utc::now();
        template.validate()?;

        self.templates.insert(id.to_string(), template.clone());

        Ok(template)
    }

    /// Delete a template by ID
    pub fn delete(&self, id: &str) -> TemplateResult<()> {
        self.templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Check if a template exists
    pub fn exists(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Get the number of templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Render a stored template with the given renderer
    pub fn render(
        &self,
        renderer: &Renderer,
        id: &str,
        data: &serde_json::Value,
        options: &RenderOptions,
    ) -> TemplateResult<Arc<RenderedTemplate>> {
        let stored = self.get(id)?;
        tracing::debug!(template_id = %id, "Rendering stored template");
        Ok(renderer.render(&stored.template, data, options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::types::Template;
    use serde_json::json;

    fn stored(id: &str, name: &str, template: Template) -> StoredTemplate {
        StoredTemplate {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            template,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_create_and_get() {
        let store = TemplateStore::new();

        let created = store
            .create(stored("test-template", "Test Template", Template::new("Hello")))
            .unwrap();
        assert_eq!(created.id, "test-template");

        let retrieved = store.get("test-template").unwrap();
        assert_eq!(retrieved.name, "Test Template");
        assert!(matches!(store.get("missing"), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_store_create_duplicate() {
        let store = TemplateStore::new();
        let template = stored("duplicate", "Test", Template::new("x"));

        store.create(template.clone()).unwrap();
        assert!(matches!(
            store.create(template),
            Err(TemplateError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_store_update() {
        let store = TemplateStore::new();
        store
            .create(stored(
                "update-test",
                "Original",
                Template::new("Body").with_title("Title"),
            ))
            .unwrap();

        let updates = UpdateTemplateRequest {
            name: Some("Updated".to_string()),
            title: Some(None),
            content: Some("New body".to_string()),
            ..Default::default()
        };

        let updated = store.update("update-test", updates).unwrap();
        assert_eq!(updated.name, "Updated");
        assert_eq!(updated.template.content, "New body");
        assert!(updated.template.title.is_none());
    }

    #[test]
    fn test_store_update_rejects_invalid() {
        let store = TemplateStore::new();
        store
            .create(stored("update-invalid", "Name", Template::new("Body")))
            .unwrap();

        let updates = UpdateTemplateRequest {
            content: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            store.update("update-invalid", updates),
            Err(TemplateError::InvalidTemplate(_))
        ));
        assert_eq!(store.get("update-invalid").unwrap().template.content, "Body");
    }

    #[test]
    fn test_store_delete() {
        let store = TemplateStore::new();
        store
            .create(stored("delete-test", "Test", Template::new("x")))
            .unwrap();
        assert!(store.exists("delete-test"));

        store.delete("delete-test").unwrap();
        assert!(!store.exists("delete-test"));
        assert!(matches!(
            store.delete("delete-test"),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn test_store_list() {
        let store = TemplateStore::new();

        for i in 0..3 {
            store
                .create(stored(
                    &format!("template-{}", i),
                    &format!("Template {}", i),
                    Template::new("x"),
                ))
                .unwrap();
        }

        assert_eq!(store.list().len(), 3);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_render_template() {
        let store = TemplateStore::new();
        let renderer = Renderer::new();

        store
            .create(stored(
                "order-shipped",
                "Order Shipped",
                Template::new("Order {{order_id}} via {{carrier | upper}}")
                    .with_title("Order {{order_id}} shipped")
                    .with_link("https://example.com/orders/{order_id}"),
            ))
            .unwrap();

        let data = json!({
            "order_id": "ORD-456",
            "carrier": "sf express"
        });

        let rendered = store
            .render(&renderer, "order-shipped", &data, &RenderOptions::uncached())
            .unwrap();
        assert_eq!(rendered.title.as_deref(), Some("Order ORD-456 shipped"));
        assert_eq!(rendered.content, "Order ORD-456 via SF EXPRESS");
        assert_eq!(
            rendered.link.as_deref(),
            Some("https://example.com/orders/ORD-456")
        );
    }

    #[test]
    fn test_render_missing_template() {
        let store = TemplateStore::new();
        let result = store.render(&Renderer::new(), "nope", &json!({}), &RenderOptions::default());
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_render_error_is_wrapped() {
        let store = TemplateStore::new();
        store
            .create(stored("bad-locale", "Bad", Template::new("x")))
            .unwrap();
        let options = RenderOptions::uncached().with_locale("xx");
        let result = store.render(&Renderer::new(), "bad-locale", &json!({}), &options);
        assert!(matches!(
            result,
            Err(TemplateError::Render(crate::template::RenderError::UnsupportedLocale(_)))
        ));
    }
}
