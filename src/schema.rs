// Diesel table definitions for the identity tables

diesel::table! {
    use diesel::sql_types::*;

    users (id) {
        id -> Int8,
        created_at -> Timestamptz,
        name -> Text,
        email -> Text,
        password_hash -> Text,
        activated -> Bool,
        version -> Int4,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    tokens (hash) {
        hash -> Bytea,
        user_id -> Int8,
        expiry -> Timestamptz,
        scope -> Text,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    permissions (id) {
        id -> Int8,
        code -> Text,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    users_permissions (user_id, permission_id) {
        user_id -> Int8,
        permission_id -> Int8,
    }
}

diesel::joinable!(tokens -> users (user_id));
diesel::joinable!(users_permissions -> users (user_id));
diesel::joinable!(users_permissions -> permissions (permission_id));

diesel::allow_tables_to_appear_in_same_query!(permissions, tokens, users, users_permissions,);
