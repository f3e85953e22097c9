diesel::table! {
    players (id) {
        id -> Int4,
        name -> Text,
    }
}

diesel::table! {
    openings (id) {
        id -> Int4,
        eco -> Text,
        name -> Text,
    }
}

diesel::table! {
    events (id) {
        id -> Int4,
        name -> Text,
        kind -> Int2,
        url -> Text,
    }
}

diesel::table! {
    games (id) {
        id -> Int8,
        event_id -> Int4,
        opening_id -> Nullable<Int4>,
        white_id -> Nullable<Int4>,
        black_id -> Nullable<Int4>,
        white_elo -> Nullable<Int2>,
        black_elo -> Nullable<Int2>,
        white_title -> Nullable<Text>,
        black_title -> Nullable<Text>,
        result -> Text,
        termination -> Text,
        base_seconds -> Nullable<Int4>,
        increment_seconds -> Nullable<Int2>,
        played_at -> Nullable<Timestamp>,
        has_clocks -> Bool,
        has_evals -> Bool,
        final_fen -> Text,
        ply_count -> Int4,
    }
}

diesel::table! {
    moves (game_id, ply) {
        game_id -> Int8,
        ply -> Int4,
        san -> Text,
        nag -> Nullable<Int2>,
        clock -> Nullable<Time>,
        eval_pawns -> Nullable<Float4>,
        eval_mate -> Nullable<Int2>,
        capture -> Bool,
        promotion -> Bool,
    }
}

diesel::joinable!(games -> events (event_id));
diesel::joinable!(games -> openings (opening_id));
diesel::joinable!(moves -> games (game_id));

diesel::allow_tables_to_appear_in_same_query!(players, openings, events, games, moves);
