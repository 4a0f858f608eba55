//! Model registry shared by the integration tests

use reinhardt_nested_orm::{Column, ModelMeta, ModelRegistry, RelationDescriptor};
use serde_json::json;

pub fn registry() -> ModelRegistry {
	ModelRegistry::new()
		.with_model(user())
		.with_model(group())
		.with_model(company())
		.with_model(employee())
		.with_model(manager())
		.with_model(role())
		.with_model(employee_role())
		.with_model(comment())
}

fn user() -> ModelMeta {
	ModelMeta::new("user")
		.column(Column::new("username"))
		.column(Column::new("is_active").default_value(json!(false)))
		.relation(RelationDescriptor::many_to_many(
			"groups",
			"group",
			"group_members",
			"user_id",
			"group_id",
		))
		.relation(RelationDescriptor::reverse("employees", "employee", "user_id").nullable())
		.relation(RelationDescriptor::reverse("managers", "manager", "user_id"))
}

fn group() -> ModelMeta {
	ModelMeta::new("group")
		.column(Column::new("name"))
		.column(Column::new("is_active").default_value(json!(true)))
		.relation(RelationDescriptor::many_to_many(
			"members",
			"user",
			"group_members",
			"group_id",
			"user_id",
		))
		.relation(RelationDescriptor::foreign_key("company", "company").nullable())
}

fn company() -> ModelMeta {
	ModelMeta::new("company")
		.column(Column::new("name"))
		.relation(RelationDescriptor::reverse("groups", "group", "company_id").nullable())
		.relation(RelationDescriptor::many_to_many(
			"managers",
			"manager",
			"company_managers",
			"company_id",
			"manager_id",
		))
		.relation(RelationDescriptor::generic(
			"comments",
			"comment",
			"content_type",
			"object_id",
		))
}

fn employee() -> ModelMeta {
	ModelMeta::new("employee")
		.column(Column::new("status"))
		.relation(RelationDescriptor::foreign_key("user", "user").nullable())
}

fn manager() -> ModelMeta {
	ModelMeta::new("manager")
		.column(Column::new("level").default_value(json!(1)))
		.relation(RelationDescriptor::foreign_key("user", "user"))
}

fn role() -> ModelMeta {
	ModelMeta::new("role")
		.column(Column::new("name"))
		.column(Column::new("permission"))
		.relation(RelationDescriptor::many_to_many_through(
			"employees",
			"employee",
			"employee_role",
			"role_id",
			"employee_id",
		))
}

fn employee_role() -> ModelMeta {
	ModelMeta::new("employee_role")
		.column(Column::new("name").default_value(json!("")))
		.relation(RelationDescriptor::foreign_key("employee", "employee"))
		.relation(RelationDescriptor::foreign_key("role", "role"))
}

fn comment() -> ModelMeta {
	ModelMeta::new("comment")
		.column(Column::new("text"))
		.column(Column::new("content_type"))
		.column(Column::new("object_id"))
}
