table! {
    raid (id) {
        id -> Uuid,
        name -> Text,
        description -> Text,
        scheduled_time -> Timestamptz,
        location -> Text,
        archived -> Bool,
        guild_id -> Int8,
        channel_id -> Int8,
        message_id -> Nullable<Int8>,
        reminder_message_id -> Nullable<Int8>,
        final_reminder_message_id -> Nullable<Int8>,
    }
}

table! {
    raid_attendance (raid_id, member_id) {
        raid_id -> Uuid,
        member_id -> Int8,
        member_name -> Text,
        status -> Int2,
        response_time -> Timestamptz,
        note -> Nullable<Text>,
    }
}

table! {
    raid_composition (raid_id, member_id) {
        raid_id -> Uuid,
        member_id -> Int8,
        character_id -> Uuid,
        job -> Text,
        sub_role -> Nullable<Text>,
    }
}

table! {
    raid_character (id) {
        id -> Uuid,
        user_id -> Int8,
        name -> Text,
        world -> Text,
        preferred_job -> Text,
        secondary_jobs -> Text,
    }
}

table! {
    user_settings (user_id) {
        user_id -> Int8,
        time_zone -> Text,
        last_updated -> Timestamptz,
    }
}

joinable!(raid_attendance -> raid (raid_id));
joinable!(raid_composition -> raid (raid_id));
joinable!(raid_composition -> raid_character (character_id));

allow_tables_to_appear_in_same_query!(
    raid,
    raid_attendance,
    raid_composition,
    raid_character,
    user_settings,
);
