//! Nested update: instance resolution and reconciliation of related records

mod fixtures;

use fixtures::{memory_db, object, serializers};
use reinhardt_nested_orm::{Database, Filter, MemoryDatabase, Record};
use reinhardt_nested_serializers::{CurrentValue, ModelSerializer, NestedContext};
use rstest::*;
use serde_json::{Value, json};
use std::sync::Arc;

#[fixture]
fn db() -> MemoryDatabase {
	memory_db()
}

async fn create(db: &MemoryDatabase, serializer: &Arc<ModelSerializer>, payload: Value) -> Record {
	let mut bound = serializer.bind(payload);
	assert!(bound.is_valid(db).await.unwrap(), "{}", bound.errors());
	bound.save(db).await.unwrap()
}

#[rstest]
#[tokio::test]
async fn test_employee_user_can_be_cleared(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::employee(db.registry());
	let employee = create(
		&db,
		&serializer,
		json!({"user": {"username": "Some name"}, "status": "Some status"}),
	)
	.await;
	let user_id = employee.get_i64("user_id").unwrap();
	let mut data = serializer.to_representation(&db, &employee).await.unwrap();
	assert_eq!(data["user"]["username"], json!("Some name"));
	data["user"] = Value::Null;

	// Act
	let mut bound = serializer.bind_instance(employee, data);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	let employee = bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(employee.get("user_id"), Some(&Value::Null));
	assert_eq!(bound.data(&db).await.unwrap()["user"], Value::Null);
	assert!(db.get("user", user_id).await.unwrap().is_some());
}

#[rstest]
#[tokio::test]
async fn test_direct_relation_updated_by_pk(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::employee(db.registry());
	let employee = create(
		&db,
		&serializer,
		json!({"user": {"username": "ann"}, "status": "new"}),
	)
	.await;
	let user_id = employee.get_i64("user_id").unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		employee,
		json!({"status": "senior", "user": {"id": user_id, "username": "ann"}}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	let employee = bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(employee.get_i64("user_id"), Some(user_id));
	assert_eq!(db.count("user", &[]).await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn test_round_trip_is_stable(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_groups(db.registry(), true);
	let user = create(
		&db,
		&serializer,
		json!({"username": "ann", "groups": [{"name": "staff"}, {"name": "ops"}]}),
	)
	.await;
	let first = serializer.to_representation(&db, &user).await.unwrap();

	// Act
	let mut bound = serializer.bind_instance(user, first.clone());
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();
	let second = bound.data(&db).await.unwrap();

	// Assert
	assert_eq!(first, second);
	assert_eq!(db.count("group", &[]).await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_repeated_update_is_idempotent(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::role(db.registry());
	let role = create(
		&db,
		&serializer,
		json!({
			"name": "dev",
			"permission": "rw",
			"employee_roles": [{"name": "lead", "employee": {"status": "a"}}],
		}),
	)
	.await;
	let payload = serializer.to_representation(&db, &role).await.unwrap();

	// Act
	let mut outputs = Vec::new();
	for _ in 0..2 {
		let mut bound = serializer.bind_instance(role.clone(), payload.clone());
		assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
		bound.save(&db).await.unwrap();
		outputs.push(bound.data(&db).await.unwrap());
	}

	// Assert
	assert_eq!(outputs[0], outputs[1]);
	assert_eq!(outputs[0], payload);
	assert_eq!(db.count("employee", &[]).await.unwrap(), 1);
	assert_eq!(db.count("employee_role", &[]).await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn test_reverse_relation_reconciled(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_staff(db.registry());
	let user = create(
		&db,
		&serializer,
		json!({"username": "bob", "employees": [{"status": "A"}, {"status": "B"}]}),
	)
	.await;
	let staff = db
		.filter("employee", &[Filter::eq("user_id", user.pk())])
		.await
		.unwrap();
	let (a, b) = (staff[0].pk(), staff[1].pk());

	// Act
	let mut bound = serializer.bind_instance(
		user.clone(),
		json!({
			"username": "bob",
			"employees": [{"id": b, "status": "B"}, {"status": "C"}],
		}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let related: Vec<_> = db
		.filter("employee", &[Filter::eq("user_id", user.pk())])
		.await
		.unwrap()
		.iter()
		.map(|e| e.get_str("status").unwrap_or_default().to_string())
		.collect();
	assert_eq!(related, vec!["B", "C"]);
	let dropped = db.get_or_err("employee", a).await.unwrap();
	assert_eq!(dropped.get("user_id"), Some(&Value::Null));
}

#[rstest]
#[tokio::test]
async fn test_non_nullable_reverse_items_deleted_when_dropped(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_staff(db.registry());
	let user = create(
		&db,
		&serializer,
		json!({"username": "bob", "managers": [{"level": 1}, {"level": 2}]}),
	)
	.await;
	let managers = db.filter("manager", &[]).await.unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		user,
		json!({"username": "bob", "managers": [{"id": managers[1].pk(), "level": 5}]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let remaining = db.filter("manager", &[]).await.unwrap();
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].pk(), managers[1].pk());
	assert_eq!(remaining[0].get("level"), Some(&json!(5)));
}

#[rstest]
#[tokio::test]
async fn test_through_update_keeps_join_records(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::role(db.registry());
	let role = create(
		&db,
		&serializer,
		json!({
			"name": "dev",
			"permission": "rw",
			"employee_roles": [{"name": "lead", "employee": {"status": "a"}}],
		}),
	)
	.await;
	let row = db.filter("employee_role", &[]).await.unwrap().remove(0);
	let employee_id = row.get_i64("employee_id").unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		role,
		json!({
			"name": "dev",
			"permission": "rw",
			"employee_roles": [
				{"id": row.pk(), "name": "lead", "employee": {"id": employee_id, "status": "b"}},
				{"name": "", "employee": {"status": "c"}},
			],
		}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(db.count("employee", &[]).await.unwrap(), 2);
	assert_eq!(db.count("employee_role", &[]).await.unwrap(), 2);
	let kept = db.get_or_err("employee_role", row.pk()).await.unwrap();
	assert_eq!(kept.get_i64("employee_id"), Some(employee_id));
	let employee = db.get_or_err("employee", employee_id).await.unwrap();
	assert_eq!(employee.get_str("status"), Some("b"));
}

#[rstest]
#[tokio::test]
async fn test_through_join_record_links_existing_sides(db: MemoryDatabase) {
	// Arrange
	let employee = db
		.insert("employee", object(json!({"status": "active"})))
		.await
		.unwrap();
	let role = db
		.insert("role", object(json!({"name": "dev", "permission": "rw"})))
		.await
		.unwrap();
	let serializer = serializers::role_with_join_ids(db.registry());

	// Act
	let mut bound = serializer.bind_instance(
		role.clone(),
		json!({
			"name": "dev",
			"permission": "rw",
			"employees": [
				{"employee_id": employee.pk(), "role_id": role.pk(), "name": "lead"},
			],
		}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(db.count("employee", &[]).await.unwrap(), 1);
	assert_eq!(db.count("role", &[]).await.unwrap(), 1);
	let rows = db.filter("employee_role", &[]).await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get_i64("employee_id"), Some(employee.pk()));
	assert_eq!(rows[0].get_i64("role_id"), Some(role.pk()));
	assert_eq!(rows[0].get_str("name"), Some("lead"));
}

#[rstest]
#[tokio::test]
async fn test_through_connecting_removal_unlinks(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::role_connecting(db.registry());
	let role = create(
		&db,
		&serializer,
		json!({"name": "ops", "permission": "r", "employees": [{"status": "x"}, {"status": "y"}]}),
	)
	.await;
	let employees = db.filter("employee", &[]).await.unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		role,
		json!({
			"name": "ops",
			"permission": "r",
			"employees": [{"id": employees[0].pk(), "status": "x"}],
		}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(db.count("employee", &[]).await.unwrap(), 2);
	let rows = db.filter("employee_role", &[]).await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get_i64("employee_id"), Some(employees[0].pk()));
}

#[rstest]
#[case(false, 1)]
#[case(true, 2)]
#[tokio::test]
async fn test_many_to_many_removal(db: MemoryDatabase, #[case] preserve: bool, #[case] expected: usize) {
	// Arrange
	let serializer = serializers::group_with_members(db.registry(), preserve);
	let group = create(
		&db,
		&serializer,
		json!({"name": "staff", "members": [{"username": "ann"}, {"username": "bob"}]}),
	)
	.await;
	let members = db.filter("user", &[]).await.unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		group.clone(),
		json!({"name": "staff", "members": [{"id": members[0].pk(), "username": "anna"}]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let linked = db
		.linked_ids("group_members", "group_id", group.pk(), "user_id")
		.await
		.unwrap();
	assert_eq!(linked.len(), expected);
	assert_eq!(db.count("user", &[]).await.unwrap(), 2);
	let renamed = db.get_or_err("user", members[0].pk()).await.unwrap();
	assert_eq!(renamed.get_str("username"), Some("anna"));
}

#[rstest]
#[tokio::test]
async fn test_generic_items_deleted_when_dropped(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::company(db.registry(), true);
	let company = create(&db, &serializer, json!({"name": "acme"})).await;
	let mut bound = serializer.bind_instance(
		company.clone(),
		json!({"name": "acme", "comments": [{"text": "a"}, {"text": "b"}]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();
	let comments = db.filter("comment", &[]).await.unwrap();

	// Act
	let mut bound = serializer.bind_instance(
		company,
		json!({"name": "acme", "comments": [{"id": comments[1].pk(), "text": "b2"}]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let remaining = db.filter("comment", &[]).await.unwrap();
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].get_str("text"), Some("b2"));
}

#[rstest]
#[tokio::test]
async fn test_unknown_pk_creates_by_default(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_groups(db.registry(), true);
	let user = create(&db, &serializer, json!({"username": "ann"})).await;

	// Act
	let mut bound = serializer.bind_instance(
		user.clone(),
		json!({"username": "ann", "groups": [{"id": 999, "name": "fresh"}]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let groups = db.filter("group", &[]).await.unwrap();
	assert_eq!(groups.len(), 1);
	assert_ne!(groups[0].pk(), 999);
	assert_eq!(
		db.linked_ids("group_members", "user_id", user.pk(), "group_id")
			.await
			.unwrap(),
		vec![groups[0].pk()]
	);
}

#[rstest]
#[tokio::test]
async fn test_unknown_pk_rejected_in_strict_mode(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_groups(db.registry(), true);
	let user = create(&db, &serializer, json!({"username": "ann"})).await;

	// Act
	let mut bound = serializer
		.bind_instance(
			user,
			json!({"username": "ann", "groups": [{"id": 999, "name": "fresh"}]}),
		)
		.with_context(NestedContext::new().with_strict_references(true));
	let valid = bound.is_valid(&db).await.unwrap();

	// Assert
	assert!(!valid);
	assert_eq!(
		bound.errors().to_json(),
		json!({"groups": [{"id": ["Invalid pk \"999\" - object does not exist."]}]})
	);
	assert_eq!(db.count("group", &[]).await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_collection_binding_restored_after_validation(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::simple_group(db.registry(), true);
	let alpha = db
		.insert("group", object(json!({"name": "alpha"})))
		.await
		.unwrap();
	let beta = db
		.insert("group", object(json!({"name": "beta"})))
		.await
		.unwrap();
	let collection = vec![alpha.clone(), beta.clone()];
	let mut bound = serializer.bind_collection(
		collection.clone(),
		json!({"id": beta.pk(), "name": "beta", "is_active": true}),
	);

	// Act
	let valid = bound.is_valid(&db).await.unwrap();

	// Assert
	assert!(valid, "{}", bound.errors());
	assert_eq!(bound.instance(), &CurrentValue::Collection(collection.clone()));
	let saved = bound.save(&db).await.unwrap();
	assert_eq!(saved.pk(), beta.pk());
	assert_eq!(bound.instance(), &CurrentValue::Collection(collection));
	assert_eq!(db.count("group", &[]).await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_partial_update_keeps_missing_fields(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::user_with_groups(db.registry(), true);
	let user = create(
		&db,
		&serializer,
		json!({"username": "ann", "groups": [{"name": "staff"}]}),
	)
	.await;

	// Act
	let mut bound = serializer
		.bind_instance(user.clone(), json!({"username": "anna"}))
		.partial();
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	let updated = bound.save(&db).await.unwrap();

	// Assert
	assert_eq!(updated.get_str("username"), Some("anna"));
	assert_eq!(
		db.linked_ids("group_members", "user_id", user.pk(), "group_id")
			.await
			.unwrap()
			.len(),
		1
	);
}

#[rstest]
#[tokio::test]
async fn test_write_source_differs_from_read_source(db: MemoryDatabase) {
	// Arrange
	let serializer = serializers::group_with_active_members(db.registry());
	let group = create(
		&db,
		&serializer,
		json!({"name": "staff", "members": [{"username": "ann"}, {"username": "bob"}]}),
	)
	.await;
	let data = serializer.to_representation(&db, &group).await.unwrap();
	let members = data["members"].as_array().unwrap().clone();
	assert_eq!(members.len(), 2);

	// Act
	let mut bound = serializer.bind_instance(
		group,
		json!({"name": "staff", "members": [members[0].clone()]}),
	);
	assert!(bound.is_valid(&db).await.unwrap(), "{}", bound.errors());
	bound.save(&db).await.unwrap();

	// Assert
	let data = bound.data(&db).await.unwrap();
	let remaining = data["members"].as_array().unwrap();
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0]["id"], members[0]["id"]);
	assert_eq!(remaining[0]["username"], json!("ann"));
	assert_eq!(db.count("user", &[]).await.unwrap(), 2);
}
