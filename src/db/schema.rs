diesel::table! {
    articles (id) {
        id -> Int4,
        author_id -> Int4,
        title -> Text,
        description -> Text,
        body -> Text,
        tag_list -> Array<Text>,
        favorites_count -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Int4,
        article_id -> Int4,
        user_id -> Int4,
        body -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    favorites (article_id, user_id) {
        article_id -> Int4,
        user_id -> Int4,
    }
}

diesel::table! {
    follows (follower_id, followee_id) {
        follower_id -> Int4,
        followee_id -> Int4,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        username -> Text,
        email -> Text,
        password -> Text,
        bio -> Nullable<Text>,
        image -> Nullable<Text>,
    }
}

diesel::joinable!(articles -> users (author_id));
diesel::joinable!(comments -> articles (article_id));
diesel::joinable!(favorites -> articles (article_id));

diesel::allow_tables_to_appear_in_same_query!(articles, comments, favorites, follows, users);
