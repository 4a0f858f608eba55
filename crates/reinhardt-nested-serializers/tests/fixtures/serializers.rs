//! Serializer declarations shared by the integration tests

use reinhardt_nested_orm::ModelRegistry;
use reinhardt_nested_serializers::{Field, ModelSerializer, ModelSerializerBuilder};
use serde_json::json;
use std::sync::Arc;

fn build(
	registry: &ModelRegistry,
	model: &str,
	configure: impl FnOnce(ModelSerializerBuilder) -> ModelSerializerBuilder,
) -> Arc<ModelSerializer> {
	let meta = registry.get(model).unwrap();
	configure(ModelSerializer::builder(meta).field(Field::primary_key("id")))
		.build()
		.unwrap()
}

/// User with a unique username checked against the resolved record
pub fn user(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	build(registry, "user", |b| {
		b.field(Field::char("username").max_length(150).unique())
			.field(Field::boolean("is_active").optional())
			.with_unique_field_revalidation()
	})
}

/// Group unique on (name, is_active)
///
/// With `revalidate` unset the set is checked by the generic pipeline.
pub fn simple_group(registry: &ModelRegistry, revalidate: bool) -> Arc<ModelSerializer> {
	build(registry, "group", |b| {
		let b = b
			.field(Field::char("name"))
			.field(Field::boolean("is_active").default(json!(true)))
			.unique_together(["name", "is_active"]);
		if revalidate {
			b.with_unique_together_revalidation()
		} else {
			b
		}
	})
}

pub fn user_with_groups(registry: &ModelRegistry, revalidate: bool) -> Arc<ModelSerializer> {
	let groups = simple_group(registry, revalidate);
	build(registry, "user", |b| {
		b.field(Field::char("username").unique())
			.field(Field::nested_many("groups", groups).optional())
			.with_unique_field_revalidation()
	})
}

pub fn group_with_members(registry: &ModelRegistry, preserve: bool) -> Arc<ModelSerializer> {
	let members = user(registry);
	build(registry, "group", |b| {
		let field = Field::nested_many("members", members).optional();
		b.field(Field::char("name"))
			.field(if preserve { field.preserve_provided() } else { field })
	})
}

/// Group reading members as `active_users` and writing them to `members`
pub fn group_with_active_members(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let members = user(registry);
	build(registry, "group", |b| {
		b.field(Field::char("name")).field(
			Field::nested_many("members", members)
				.source("active_users")
				.write_source("members")
				.optional(),
		)
	})
}

pub fn employee_basic(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	build(registry, "employee", |b| b.field(Field::char("status")))
}

/// Employee with an optional, clearable user
pub fn employee(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let user = user(registry);
	build(registry, "employee", |b| {
		b.field(Field::char("status"))
			.field(Field::nested("user", user).optional().allow_null())
	})
}

pub fn manager_basic(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	build(registry, "manager", |b| b.field(Field::integer("level").optional()))
}

pub fn manager(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let user = user(registry);
	build(registry, "manager", |b| {
		b.field(Field::integer("level").optional())
			.field(Field::nested("user", user))
	})
}

pub fn user_with_staff(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let employees = employee_basic(registry);
	let managers = manager_basic(registry);
	build(registry, "user", |b| {
		b.field(Field::char("username").unique())
			.field(Field::nested_many("employees", employees).optional())
			.field(Field::nested_many("managers", managers).optional())
			.with_unique_field_revalidation()
	})
}

pub fn comment(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	build(registry, "comment", |b| b.field(Field::char("text")))
}

pub fn company(registry: &ModelRegistry, forbid_nested_on_create: bool) -> Arc<ModelSerializer> {
	let managers = manager(registry);
	let comments = comment(registry);
	build(registry, "company", |b| {
		let b = b
			.field(Field::char("name"))
			.field(Field::nested_many("managers", managers).optional())
			.field(Field::nested_many("comments", comments).optional());
		if forbid_nested_on_create {
			b.forbidden_on_create(["managers", "comments"])
		} else {
			b
		}
	})
}

/// Join record of the role/employee relation
pub fn employee_role(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let employee = employee_basic(registry);
	build(registry, "employee_role", |b| {
		b.field(Field::char("name").allow_blank().default(json!("")))
			.field(Field::nested("employee", employee))
	})
}

/// Role whose `employees` items are join records
pub fn role(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let rows = employee_role(registry);
	build(registry, "role", |b| {
		b.field(Field::char("name"))
			.field(Field::char("permission"))
			.field(
				Field::nested_many("employee_roles", rows)
					.source("employees")
					.optional(),
			)
			.unique_together(["name", "permission"])
			.with_unique_together_revalidation()
	})
}

/// Role whose `employees` items are employees linked through join records
pub fn role_connecting(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let employees = employee_basic(registry);
	build(registry, "role", |b| {
		b.field(Field::char("name"))
			.field(Field::char("permission"))
			.field(
				Field::nested_many("employees", employees)
					.connect_to_model()
					.optional(),
			)
	})
}

/// Join record naming both sides by primary key
pub fn employee_role_ids(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	build(registry, "employee_role", |b| {
		b.field(Field::char("name").allow_blank().default(json!("")))
			.field(Field::integer("employee_id"))
			.field(Field::integer("role_id"))
	})
}

/// Role whose `employees` items are join records carrying raw ids
pub fn role_with_join_ids(registry: &ModelRegistry) -> Arc<ModelSerializer> {
	let rows = employee_role_ids(registry);
	build(registry, "role", |b| {
		b.field(Field::char("name"))
			.field(Field::char("permission"))
			.field(Field::nested_many("employees", rows).optional())
	})
}
