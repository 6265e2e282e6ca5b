//! End-to-end builder scenarios: social-graph schemas projected the way a
//! GraphQL selection set would be.

use std::sync::Arc;

use prism_core::{BuildError, Expr, FuncSig, NativeFunc, Query};
use prism_schema::{builtins, Field, SchemaBuilder, Type, TypeRegistry, Value};

fn date_schema(reg: &TypeRegistry) -> Type {
    let mut b = SchemaBuilder::new("Date");
    b.field(Field::new("day", builtins::int())).expect("field");
    b.field(Field::new("month", builtins::int())).expect("field");
    b.field(Field::new("year", builtins::int())).expect("field");
    let ty = Type::record(b.finish());
    reg.register("Date", ty.clone()).expect("register");
    ty
}

fn user_schema(reg: &TypeRegistry) -> Type {
    date_schema(reg);
    let mut b = SchemaBuilder::new("User");
    b.field(Field::new("id", builtins::string())).expect("field");
    b.field(Field::new("handle", builtins::string())).expect("field");
    b.field(Field::new("firstName", builtins::string())).expect("field");
    b.field(Field::new("lastName", builtins::string())).expect("field");
    b.field(Field::new("name", builtins::string())).expect("field");
    b.field(Field::new("birthday", Type::named("Date"))).expect("field");
    b.field(Field::new("friends", builtins::list_of(Type::named("User"))))
        .expect("field");
    let ty = Type::record(b.finish());
    reg.register("User", ty.clone()).expect("register");
    ty
}

fn page_schema(reg: &TypeRegistry) -> Type {
    let mut b = SchemaBuilder::new("Page");
    b.field(Field::new("id", builtins::string())).expect("field");
    b.field(Field::new("handle", builtins::string())).expect("field");
    b.field(Field::new("url", builtins::url())).expect("field");
    let ty = Type::record(b.finish());
    reg.register("Page", ty.clone()).expect("register");
    ty
}

fn get_profile_pic() -> Arc<NativeFunc> {
    NativeFunc::new(
        FuncSig::new("get_profile_pic", builtins::url())
            .param("id", builtins::string())
            .param_with_default("size", builtins::int(), Value::Int(100)),
        |_| Ok(Value::Null),
    )
    .expect("native")
}

fn field_names(ty: &Type) -> Vec<String> {
    let Type::Record(schema) = ty else {
        panic!("expected a record output, got {}", ty.display());
    };
    schema.fields().map(|f| f.name().to_string()).collect()
}

#[test]
fn empty_query_yields_empty_record() {
    let reg = TypeRegistry::new();
    let q = Query::default();
    let ty = q.return_type(&reg).expect("type");
    assert!(field_names(ty).is_empty());
}

#[test]
fn basic_selection_mirrors_the_input_fields() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))])
        .select("id")
        .select("firstName")
        .select("lastName");
    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["id", "firstName", "lastName"]);

    let Type::Record(schema) = ty else { unreachable!() };
    for name in ["id", "firstName", "lastName"] {
        let field = schema.field(name).expect("field");
        assert_eq!(field.base_type(), &builtins::string());
        assert!(!field.optional);
    }
}

#[test]
fn nested_derivations_project_sub_records_and_lists() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let birthday = Arc::new(
        Query::new([("date", Type::named("Date"))])
            .select("month")
            .select("day"),
    );
    let friend = Arc::new(Query::new([("friend", Type::named("User"))]).select("name"));

    let q = Query::new([("user", Type::named("User"))])
        .select("id")
        .select((
            "birthday",
            birthday.apply([("date", Expr::path("$user/birthday"))]),
        ))
        .select((
            "friends",
            Expr::fmap(Expr::from(friend.clone()), Expr::path("$user/friends")),
        ));

    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["id", "birthday", "friends"]);

    let Type::Record(schema) = ty else { unreachable!() };
    let birthday_ty = birthday.return_type(&reg).expect("type").clone();
    assert_eq!(field_names(&birthday_ty), ["month", "day"]);
    assert_eq!(schema.field("birthday").expect("field").base_type(), &birthday_ty);

    let friend_ty = friend.return_type(&reg).expect("type").clone();
    assert_eq!(
        schema.field("friends").expect("field").base_type(),
        &builtins::list_of(friend_ty)
    );
}

#[test]
fn native_calls_project_aliased_fields() {
    let reg = TypeRegistry::new();
    user_schema(&reg);
    let pic = get_profile_pic();

    let q = Query::new([("user", Type::named("User"))])
        .select("id")
        .select((
            "profilePic",
            pic.call([
                ("id", Expr::path("$user/id")),
                ("size", Expr::from(700i64)),
            ]),
        ))
        .select((
            "smallPic",
            pic.call([
                ("id", Expr::path("$user/id")),
                ("size", Expr::from(64i64)),
            ]),
        ));

    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["id", "profilePic", "smallPic"]);
    let Type::Record(schema) = ty else { unreachable!() };
    assert_eq!(schema.field("profilePic").expect("field").base_type(), &builtins::url());
    assert_eq!(schema.field("smallPic").expect("field").base_type(), &builtins::url());
}

#[test]
fn fragments_splice_sub_query_fields_in_order() {
    let reg = TypeRegistry::new();
    user_schema(&reg);
    let pic = get_profile_pic();

    let pic_fragment = Arc::new(Query::inline([("user", Type::named("User"))]).select((
        "profilePic",
        pic.call([("id", Expr::path("$user/id"))]),
    )));
    let friend = Arc::new(
        Query::new([("user", Type::named("User"))])
            .select("id")
            .select("name")
            .include(pic_fragment, [("user", Expr::path("$user"))]),
    );
    let q = Query::new([("user", Type::named("User"))])
        .select((
            "friends",
            Expr::fmap(Expr::from(friend.clone()), Expr::path("$user/friends")),
        ));

    let friend_ty = friend.return_type(&reg).expect("type");
    assert_eq!(field_names(friend_ty), ["id", "name", "profilePic"]);
    // An exact-type bind with no condition keeps the cloned fields required.
    let Type::Record(schema) = friend_ty else { unreachable!() };
    assert!(!schema.field("profilePic").expect("field").optional);

    q.return_type(&reg).expect("type");
}

#[test]
fn sum_typed_bind_makes_fragment_fields_optional() {
    let reg = TypeRegistry::new();
    let user_ty = user_schema(&reg);
    let page_ty = page_schema(&reg);
    let profile_ty = Type::sum([user_ty, page_ty]);

    let user_part = Arc::new(
        Query::new([("user", Type::named("User"))]).select(("userName", "$user/name")),
    );
    let page_part = Arc::new(
        Query::new([("page", Type::named("Page"))]).select(("pageUrl", "$page/url")),
    );

    let q = Query::new([("profile", profile_ty)])
        .select("handle")
        .include(user_part, [("user", Expr::path("$profile"))])
        .include(page_part, [("page", Expr::path("$profile"))]);

    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["handle", "userName", "pageUrl"]);
    let Type::Record(schema) = ty else { unreachable!() };
    // The shared field stays required; per-alternative fields may not fire.
    assert!(!schema.field("handle").expect("field").optional);
    assert!(schema.field("userName").expect("field").optional);
    assert!(schema.field("pageUrl").expect("field").optional);
}

#[test]
fn conditional_inclusion_makes_every_cloned_field_optional() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let details = Arc::new(
        Query::new([("user", Type::named("User"))])
            .select("firstName")
            .select("lastName"),
    );
    let q = Query::new([("user", Type::named("User")), ("expandInfo", builtins::boolean())])
        .select(("id", "$user/id"))
        .select(("name", "$user/name"))
        .include_if(
            Expr::path("$expandInfo"),
            details,
            [("user", Expr::path("$user"))],
        );

    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["id", "name", "firstName", "lastName"]);
    let Type::Record(schema) = ty else { unreachable!() };
    assert!(!schema.field("id").expect("field").optional);
    assert!(schema.field("firstName").expect("field").optional);
    assert!(schema.field("lastName").expect("field").optional);
}

#[test]
fn named_queries_register_their_output_schema() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))])
        .select("id")
        .named("UserSummary");
    let ty = q.return_type(&reg).expect("type");
    let Type::Record(schema) = ty else { unreachable!() };
    assert_eq!(schema.name(), "UserSummary");
    assert!(reg.contains("UserSummary"));
    assert_eq!(&reg.resolve("UserSummary").expect("resolve"), ty);
}

#[test]
fn return_type_is_computed_once() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))]).select("id");
    let Type::Record(first) = q.return_type(&reg).expect("type").clone() else {
        unreachable!()
    };
    let Type::Record(second) = q.return_type(&reg).expect("type").clone() else {
        unreachable!()
    };
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn generated_schema_handles_are_stable_per_query() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    // The name an error path reports must be the name the schema is later
    // registered under.
    let sub = Arc::new(Query::new([("user", Type::named("User"))]).select("id"));
    let q = Query::new([("user", Type::named("User"))])
        .include(sub.clone(), [("somebody", Expr::path("$user"))]);
    let BuildError::UnknownBindParam { query: reported, .. } =
        q.return_type(&reg).expect_err("unknown param")
    else {
        panic!("expected an unknown bind param error");
    };
    let Type::Record(schema) = sub.return_type(&reg).expect("type") else {
        unreachable!()
    };
    assert_eq!(reported, schema.name());

    // Extending a built query rebuilds its schema under the same name.
    let q = Query::new([("user", Type::named("User"))]).select("id");
    let Type::Record(first) = q.return_type(&reg).expect("type").clone() else {
        unreachable!()
    };
    let q = q.select("name");
    let Type::Record(second) = q.return_type(&reg).expect("type").clone() else {
        unreachable!()
    };
    assert_eq!(first.name(), second.name());
    assert_eq!(&reg.resolve(second.name()).expect("resolve"), &Type::Record(second));
}

#[test]
fn reselecting_the_same_shape_merges_silently() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))])
        .select(("id", "$user/id"))
        .select(("id", "$user/id"));
    let ty = q.return_type(&reg).expect("type");
    assert_eq!(field_names(ty), ["id"]);
}

#[test]
fn conflicting_reselection_is_rejected() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))])
        .select(("id", "$user/id"))
        .select(("id", "$user/birthday"));
    let err = q.return_type(&reg).expect_err("conflict");
    assert!(matches!(err, BuildError::DuplicateSelector { .. }));
}

#[test]
fn shorthand_needs_exactly_one_input() {
    let reg = TypeRegistry::new();
    let user_ty = user_schema(&reg);
    let page_ty = page_schema(&reg);

    let two = Query::new([("user", user_ty), ("page", page_ty)]).select("id");
    let err = two.return_type(&reg).expect_err("ambiguous");
    assert!(matches!(err, BuildError::AmbiguousSelector { inputs: 2, .. }));

    let zero = Query::default().select("id");
    let err = zero.return_type(&reg).expect_err("ambiguous");
    assert!(matches!(err, BuildError::AmbiguousSelector { inputs: 0, .. }));
}

#[test]
fn undeclared_variables_fail_the_type_pass() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::new([("user", Type::named("User"))])
        .select(("id", Expr::path("$ghost/id")));
    let err = q.return_type(&reg).expect_err("undeclared");
    assert!(matches!(err, BuildError::UndeclaredVar(ref name) if name == "ghost"));
}

#[test]
fn binding_an_undeclared_fragment_param_is_rejected() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let sub = Arc::new(Query::new([("user", Type::named("User"))]).select("id"));
    let q = Query::new([("user", Type::named("User"))])
        .include(sub, [("somebody", Expr::path("$user"))]);
    let err = q.return_type(&reg).expect_err("unknown param");
    assert!(matches!(err, BuildError::UnknownBindParam { ref param, .. } if param == "somebody"));
}

#[test]
fn fmap_requires_a_unary_type_application() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let friend = Arc::new(Query::new([("friend", Type::named("User"))]).select("name"));
    let q = Query::new([("user", Type::named("User"))]).select((
        "friends",
        Expr::fmap(Expr::from(friend), Expr::path("$user/id")),
    ));
    let err = q.return_type(&reg).expect_err("non functor");
    assert!(matches!(err, BuildError::FmapNonFunctor { .. }));
}

#[test]
fn inline_queries_have_no_standalone_body() {
    let reg = TypeRegistry::new();
    user_schema(&reg);

    let q = Query::inline([("user", Type::named("User"))]).select("id");
    q.return_type(&reg).expect("type");
    let err = q.body(&reg).expect_err("inline");
    assert!(matches!(err, BuildError::InlineBody));
}
